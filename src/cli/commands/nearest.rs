//! Match command: nearest-neighbor lookup for a record.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{PgRecordStore, RecordStore};

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Record id to match against
    pub id: Option<Uuid>,

    /// Number of candidates to return
    #[arg(long, short = 'n', default_value_t = 3)]
    pub limit: u64,

    /// Pick a random embedded record as the probe
    #[arg(long, conflicts_with = "id")]
    pub sample: bool,
}

pub async fn handle_match(args: MatchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let store = PgRecordStore::new(&config.store, config.embedding.dimension)
        .await
        .context("failed to connect to record store")?;

    let probe = match args.id {
        Some(id) => id,
        None if args.sample => store
            .sample_embedded()
            .await?
            .context("no embedded records to sample; run `matchsync sync` first")?,
        None => anyhow::bail!("provide a record id or use --sample"),
    };

    if verbose {
        println!("Probe record: {}", probe);
    }

    let query = store
        .fetch_embedding(probe)
        .await?
        .with_context(|| format!("record {} has no embedding yet", probe))?;

    let candidates = store.nearest(&query, probe, args.limit).await?;

    print!("{}", formatter.format_matches(probe, &candidates));

    Ok(())
}
