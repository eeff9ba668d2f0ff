//! Sync command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, PgRecordStore, RecordStore, SyncJob};
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Records per embedding API call (overrides config)
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Abort on the first failed batch instead of continuing
    #[arg(long)]
    pub fail_fast: bool,

    /// Show how many records would be embedded without calling the API
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_sync(args: SyncArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let batch_size = args.batch_size.unwrap_or(config.embedding.batch_size) as usize;
    let dimension = config.embedding.dimension as usize;

    let store = PgRecordStore::new(&config.store, config.embedding.dimension)
        .await
        .context("failed to connect to record store")?;
    store.ensure_collection().await?;

    if args.dry_run {
        let pending = store.fetch_pending(None).await?;
        println!(
            "{}",
            formatter.format_message(&format!(
                "Dry run: would embed {} pending record(s) in {} batch(es)",
                pending.len(),
                pending.len().div_ceil(batch_size)
            ))
        );
        return Ok(());
    }

    let embedder =
        EmbeddingClient::new(&config.embedding).context("failed to create embedding client")?;

    if verbose {
        println!(
            "Embedding with model {} ({} dimensions, batch size {})",
            config.embedding.model, dimension, batch_size
        );
    }

    let retry = RetryPolicy::new(
        config.sync.max_retries,
        Duration::from_millis(config.sync.retry_delay_ms),
    );
    let job = SyncJob::new(batch_size, dimension)
        .with_retry(retry)
        .with_fail_fast(args.fail_fast || config.sync.fail_fast);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    let report = job.run(&store, &embedder, &pb).await?;
    pb.finish_and_clear();

    print!("{}", formatter.format_sync_report(&report));

    if !report.is_clean() {
        eprintln!();
        eprintln!(
            "Hint: {} record(s) stayed pending; re-run `matchsync sync` to retry them.",
            report.failed_records()
        );
    }

    Ok(())
}
