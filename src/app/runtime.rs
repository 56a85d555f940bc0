//! The fetch run: config, input, index load, sequential fetch loop, index save.

use anyhow::{Context, Result};
use image_fetcher_core::download::ensure_output_dir;
use image_fetcher_core::{
    DuplicateIndex, FetchConfig, FetchContext, FetchOutcome, Fetcher, IndexStore,
};
use tracing::{debug, info, warn};

use crate::app::report::{self, RunSummary};
use crate::app::input_processor;
use crate::app_config;
use crate::cli::Args;

pub(crate) async fn run_fetcher(args: Args) -> Result<()> {
    let loaded = app_config::load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref()
        && loaded.config.is_some()
    {
        info!(path = %path.display(), "Loaded config file");
    }
    let config = app_config::resolve_fetch_config(&args, loaded.config.as_ref())?;
    debug!(?config, "resolved configuration");

    let urls = input_processor::collect_urls(&args)?;
    if urls.is_empty() {
        info!("No URLs provided. Pass URLs as arguments, with --file, or via stdin.");
        return Ok(());
    }
    if urls.duplicates() > 0 {
        info!(repeated = urls.duplicates(), "Dropped repeated URLs");
    }

    ensure_output_dir(&config.output_dir)
        .await
        .with_context(|| format!("Cannot create output directory '{}'", config.output_dir.display()))?;

    let index = load_index(&config).await?;
    info!(known = index.len(), "Duplicate index ready");

    let fetcher = Fetcher::from_config(&config).context("Failed to build HTTP client")?;
    let ctx = FetchContext::new(&config.output_dir, index);

    let total = urls.len();
    let mut summary = RunSummary::default();
    let mut fatal = None;

    for (position, url) in urls.urls().iter().enumerate() {
        if position > 0 && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
        if !args.quiet {
            println!("[{}/{total}] {url}", position + 1);
        }

        let outcome = match fetcher.fetch(&ctx, url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                fatal = Some(e);
                break;
            }
        };
        if let FetchOutcome::Rejected(reason) = &outcome {
            info!(%url, %reason, "Rejected");
        }
        if !args.quiet {
            println!("  {}", report::outcome_line(&outcome));
        }
        summary.record(&outcome);
    }

    let index = ctx.into_index();
    if config.use_index {
        let saved = save_index(&config, index).await;
        if let Some(e) = fatal {
            if let Err(save_error) = saved {
                warn!(error = %save_error, "Index not saved after storage failure");
            }
            return Err(e).context("Storage failure, run aborted");
        }
        saved?;
    } else if let Some(e) = fatal {
        return Err(e).context("Storage failure, run aborted");
    }

    if !args.quiet {
        println!();
        println!("{summary}");
        println!("Output directory: {}", report::display_dir(&config.output_dir));
    }
    info!(
        saved = summary.saved,
        duplicate = summary.duplicate,
        rejected = summary.rejected,
        failed = summary.failed,
        total = summary.total(),
        "Fetch complete"
    );
    Ok(())
}

async fn load_index(config: &FetchConfig) -> Result<DuplicateIndex> {
    if !config.use_index {
        debug!("index disabled, starting empty");
        return Ok(DuplicateIndex::new());
    }
    let store = IndexStore::in_dir(&config.output_dir);
    let index = tokio::task::spawn_blocking(move || store.load_or_rebuild())
        .await
        .context("Index load task failed")?
        .context("Failed to load duplicate index")?;
    Ok(index)
}

async fn save_index(config: &FetchConfig, index: DuplicateIndex) -> Result<()> {
    let store = IndexStore::in_dir(&config.output_dir);
    tokio::task::spawn_blocking(move || store.save(&index))
        .await
        .context("Index save task failed")?
        .context("Failed to save duplicate index")?;
    Ok(())
}
