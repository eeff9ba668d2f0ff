mod embedding;
mod store;
mod sync;

pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use store::{PgRecordStore, RecordStore};
pub use sync::SyncJob;
