//! Sync run reporting and output format models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Why a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A returned vector had the wrong length.
    DimensionMismatch,
    /// The API returned a different number of vectors than texts sent.
    CountMismatch,
    /// The embedding call failed after retries.
    Embedding,
    /// A store write failed after retries.
    Store,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::DimensionMismatch => write!(f, "dimension mismatch"),
            FailureKind::CountMismatch => write!(f, "count mismatch"),
            FailureKind::Embedding => write!(f, "embedding"),
            FailureKind::Store => write!(f, "store"),
        }
    }
}

/// A batch the sync job could not complete.
///
/// The records of a failed batch stay pending, so the next run picks
/// them up again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Zero-based index of the batch within the run.
    pub batch_index: usize,
    pub kind: FailureKind,
    pub record_ids: Vec<Uuid>,
    pub error: String,
}

/// Aggregate outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records selected by the pending filter at the start of the run.
    pub pending: u64,
    /// Records whose embedding was written.
    pub embedded: u64,
    /// Embedding API calls made.
    pub batches: u64,
    pub failures: Vec<BatchFailure>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Records that stayed pending because their batch failed.
    pub fn failed_records(&self) -> u64 {
        self.failures.iter().map(|f| f.record_ids.len() as u64).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_failed_records_sums_batches() {
        let report = SyncReport {
            pending: 20,
            embedded: 12,
            batches: 2,
            failures: vec![BatchFailure {
                batch_index: 1,
                kind: FailureKind::DimensionMismatch,
                record_ids: (0..8).map(|_| Uuid::new_v4()).collect(),
                error: "short vector".to_string(),
            }],
            duration_ms: 5,
        };

        assert_eq!(report.failed_records(), 8);
        assert!(!report.is_clean());
    }
}
