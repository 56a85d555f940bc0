//! Assembly of the URL list from positional args, `--file`, piped stdin, or a prompt.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image_fetcher_core::{UrlList, parse_url_list};
use tracing::{debug, warn};

use crate::cli::Args;

const PROMPT: &str = "Enter image URLs (separated by commas or spaces): ";

/// Gathers URLs from every non-interactive source, falling back to a prompt
/// when stdin is a terminal and nothing else supplied a URL.
pub(crate) fn collect_urls(args: &Args) -> Result<UrlList> {
    let file_text = args.file.as_deref().and_then(read_url_file);

    let mut urls = assemble_urls(&args.urls, file_text.as_deref(), None);
    if !urls.is_empty() {
        return Ok(urls);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        let answer = prompt_for_urls(&mut stdin.lock(), &mut io::stdout())?;
        urls.extend(parse_url_list(&answer));
    } else {
        let mut buffer = String::new();
        stdin
            .lock()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        urls.extend(parse_url_list(&buffer));
    }
    Ok(urls)
}

/// Merges URL sources in order: positional args, file text, then stdin text.
pub(crate) fn assemble_urls(
    positional: &[String],
    file_text: Option<&str>,
    stdin_text: Option<&str>,
) -> UrlList {
    let mut urls = parse_url_list(&positional.join("\n"));
    for text in [file_text, stdin_text].into_iter().flatten() {
        urls.extend(parse_url_list(text));
    }
    debug!(%urls, "assembled input");
    urls
}

/// Reads a URL file; a missing or unreadable file is reported and skipped.
fn read_url_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(error) => {
            warn!(path = %path.display(), %error, "Cannot read URL file, continuing without it");
            None
        }
    }
}

/// Prints the prompt and reads one line of answer.
pub(crate) fn prompt_for_urls(input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    write!(output, "{PROMPT}")?;
    output.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read URLs from prompt")?;
    Ok(line.trim().to_string())
}
