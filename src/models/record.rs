//! Record models for member match candidates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record whose identity text exists but whose embedding does not.
///
/// Only the id and text are fetched; the selection filter makes the sync
/// job idempotent because embedded records fall out of the next pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    pub id: Uuid,
    pub identity_text: String,
}

/// A nearest-neighbor candidate returned by the match command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: Uuid,

    /// Cosine similarity against the probe record's embedding.
    pub score: f32,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub member_group_id: Option<String>,
}

impl MatchCandidate {
    /// Display name assembled from whichever name parts are present.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => "(unnamed)".to_string(),
        }
    }
}

/// Aggregate counts over the collection, for the status command.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecordCounts {
    pub total: u64,
    pub embedded: u64,
    pub pending: u64,
}
