mod config;
mod record;
mod report;

pub use config::{
    Config, EmbeddingConfig, StoreConfig, SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL,
};
pub use record::{MatchCandidate, PendingRecord, RecordCounts};
pub use report::{BatchFailure, FailureKind, OutputFormat, SyncReport};
