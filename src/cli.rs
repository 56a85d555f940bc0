//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use image_fetcher_core::ImageType;

/// Download images from URLs into a local folder.
///
/// Only allow-listed image types under the size limit are kept, and content
/// that was already saved (by hash) is skipped.
#[derive(Parser, Debug)]
#[command(name = "image-fetcher")]
#[command(author, version, about)]
pub struct Args {
    /// Image URLs to fetch (commas or whitespace also separate)
    pub urls: Vec<String>,

    /// Read URLs from a file (one per line, `#` comments allowed)
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Output directory [default: Fetched_Images]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Maximum accepted size in bytes [default: 10485760]
    #[arg(short = 'm', long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_bytes: Option<u64>,

    /// Network timeout in seconds (1-3600) [default: 15]
    #[arg(short = 't', long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Delay between URLs in milliseconds (0-60000) [default: 600]
    #[arg(short = 'd', long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay: Option<u64>,

    /// Accept only these types (repeatable; e.g. png, image/jpeg)
    #[arg(long = "allow-type", value_name = "TYPE", value_parser = parse_image_type)]
    pub allow_types: Vec<ImageType>,

    /// Do not read or write index.json in the output directory
    #[arg(long)]
    pub no_index: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_image_type(value: &str) -> Result<ImageType, String> {
    ImageType::from_name(value).ok_or_else(|| {
        let known: Vec<&str> = ImageType::ALL.iter().map(|kind| kind.mime()).collect();
        format!("unknown image type '{value}' (expected one of: {})", known.join(", "))
    })
}
