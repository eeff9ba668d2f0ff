use anyhow::Result;

use crate::cli::output::{get_formatter, StatusInfo};
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, PgRecordStore, RecordStore};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (store_connected, counts) =
        match PgRecordStore::new(&config.store, config.embedding.dimension).await {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let counts = if connected {
                    store.count_records().await.ok()
                } else {
                    None
                };
                (connected, counts)
            }
            Err(_) => (false, None),
        };

    let embedding_reachable = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => client.health_check().await.unwrap_or(false),
        Err(_) => false,
    };

    let status = StatusInfo {
        store_url: config.store.url.clone(),
        store_connected,
        collection: config.store.collection.clone(),
        counts,
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.dimension,
        embedding_reachable,
    };

    print!("{}", formatter.format_status(&status));

    if !store_connected || !embedding_reachable {
        eprintln!();
        if !store_connected {
            eprintln!("Warning: record store not accessible. Check DATABASE_URL and that pgvector is installed.");
        }
        if !embedding_reachable {
            eprintln!("Warning: embedding API not reachable. Check MATCHSYNC_EMBEDDING_URL and MATCHSYNC_API_KEY.");
        }
    }

    Ok(())
}
