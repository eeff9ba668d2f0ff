//! The embedding sync job.
//!
//! Selects records whose identity text exists but whose embedding does
//! not, embeds them in fixed-size batches, and writes each vector back
//! with a point update. Embedded records drop out of the selection, so
//! re-running the job resumes wherever a previous run stopped.

use std::time::Instant;

use indicatif::ProgressBar;

use crate::error::SyncError;
use crate::models::{BatchFailure, FailureKind, PendingRecord, SyncReport};
use crate::services::{EmbeddingProvider, RecordStore};
use crate::utils::retry::RetryPolicy;

pub struct SyncJob {
    batch_size: usize,
    dimension: usize,
    retry: RetryPolicy,
    fail_fast: bool,
}

/// A batch that could not be fully written. `written` records were
/// persisted before the failure and stay embedded.
struct BatchError {
    written: u64,
    source: SyncError,
}

impl From<SyncError> for BatchError {
    fn from(source: SyncError) -> Self {
        Self { written: 0, source }
    }
}

impl SyncJob {
    pub fn new(batch_size: usize, dimension: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            dimension,
            retry: RetryPolicy::default(),
            fail_fast: false,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Abort the run on the first failed batch instead of recording the
    /// failure and continuing.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run one sync pass and return the aggregate report.
    ///
    /// A failed batch leaves its unwritten records pending and, unless
    /// fail-fast is set, the job moves on to the next batch.
    pub async fn run(
        &self,
        store: &dyn RecordStore,
        embedder: &dyn EmbeddingProvider,
        progress: &ProgressBar,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();

        let pending = store.fetch_pending(None).await.map_err(SyncError::Store)?;

        let mut report = SyncReport {
            pending: pending.len() as u64,
            ..Default::default()
        };

        progress.set_length(pending.len().div_ceil(self.batch_size) as u64);

        for (batch_index, batch) in pending.chunks(self.batch_size).enumerate() {
            report.batches += 1;

            match self.process_batch(store, embedder, batch).await {
                Ok(written) => {
                    report.embedded += written;
                }
                Err(err) => {
                    report.embedded += err.written;
                    let skipped = err.written as usize;
                    report.failures.push(BatchFailure {
                        batch_index,
                        kind: failure_kind(&err.source),
                        record_ids: batch[skipped..].iter().map(|r| r.id).collect(),
                        error: err.source.to_string(),
                    });

                    if self.fail_fast {
                        return Err(err.source);
                    }
                }
            }

            progress.inc(1);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn process_batch(
        &self,
        store: &dyn RecordStore,
        embedder: &dyn EmbeddingProvider,
        batch: &[PendingRecord],
    ) -> Result<u64, BatchError> {
        let texts: Vec<String> = batch.iter().map(|r| r.identity_text.clone()).collect();

        let vectors = self
            .retry
            .run(|| embedder.embed_batch(&texts))
            .await
            .map_err(SyncError::Embedding)?;

        if vectors.len() != batch.len() {
            return Err(SyncError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            }
            .into());
        }

        // Validate the whole batch before writing anything, so a bad
        // vector never leaves the batch partially written.
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(SyncError::DimensionMismatch {
                    position,
                    expected: self.dimension,
                    actual: vector.len(),
                }
                .into());
            }
        }

        let mut written = 0;
        for (record, vector) in batch.iter().zip(vectors.iter()) {
            self.retry
                .run(|| store.write_embedding(record.id, vector))
                .await
                .map_err(|e| BatchError {
                    written,
                    source: SyncError::Store(e),
                })?;
            written += 1;
        }

        Ok(written)
    }
}

fn failure_kind(error: &SyncError) -> FailureKind {
    match error {
        SyncError::DimensionMismatch { .. } => FailureKind::DimensionMismatch,
        SyncError::CountMismatch { .. } => FailureKind::CountMismatch,
        SyncError::Embedding(_) => FailureKind::Embedding,
        SyncError::Store(_) => FailureKind::Store,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    use crate::error::{EmbeddingError, StoreError};
    use crate::models::{MatchCandidate, RecordCounts};

    const DIM: usize = 4;

    /// In-memory store: insertion-ordered records with optional vectors.
    struct MemStore {
        records: Mutex<Vec<(Uuid, String, Option<Vec<f32>>)>>,
        writes: Mutex<u64>,
        fail_write_for: Option<Uuid>,
    }

    impl MemStore {
        fn with_pending(texts: &[&str]) -> Self {
            Self {
                records: Mutex::new(
                    texts
                        .iter()
                        .map(|t| (Uuid::new_v4(), t.to_string(), None))
                        .collect(),
                ),
                writes: Mutex::new(0),
                fail_write_for: None,
            }
        }

        fn ids(&self) -> Vec<Uuid> {
            self.records.lock().unwrap().iter().map(|r| r.0).collect()
        }

        fn vector_for(&self, id: Uuid) -> Option<Vec<f32>> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.0 == id)
                .and_then(|r| r.2.clone())
        }

        fn write_count(&self) -> u64 {
            *self.writes.lock().unwrap()
        }
    }

    #[async_trait]
    impl RecordStore for MemStore {
        async fn health_check(&self) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn ensure_collection(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn count_records(&self) -> Result<RecordCounts, StoreError> {
            let records = self.records.lock().unwrap();
            let embedded = records.iter().filter(|r| r.2.is_some()).count() as u64;
            Ok(RecordCounts {
                total: records.len() as u64,
                embedded,
                pending: records.len() as u64 - embedded,
            })
        }

        async fn fetch_pending(&self, limit: Option<i64>) -> Result<Vec<PendingRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            let mut pending: Vec<PendingRecord> = records
                .iter()
                .filter(|r| r.2.is_none())
                .map(|r| PendingRecord {
                    id: r.0,
                    identity_text: r.1.clone(),
                })
                .collect();
            if let Some(limit) = limit {
                pending.truncate(limit as usize);
            }
            Ok(pending)
        }

        async fn write_embedding(&self, id: Uuid, vector: &[f32]) -> Result<(), StoreError> {
            if self.fail_write_for == Some(id) {
                return Err(StoreError::UpdateError("disk full".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.0 == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            record.2 = Some(vector.to_vec());
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        async fn fetch_embedding(&self, id: Uuid) -> Result<Option<Vec<f32>>, StoreError> {
            Ok(self.vector_for(id))
        }

        async fn sample_embedded(&self) -> Result<Option<Uuid>, StoreError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().find(|r| r.2.is_some()).map(|r| r.0))
        }

        async fn nearest(
            &self,
            _query: &[f32],
            _exclude: Uuid,
            _limit: u64,
        ) -> Result<Vec<MatchCandidate>, StoreError> {
            Ok(Vec::new())
        }

        fn collection(&self) -> &str {
            "patients"
        }
    }

    /// Embedder that encodes the text's trailing number into the vector,
    /// with configurable per-call misbehavior.
    struct MemEmbedder {
        call_sizes: Mutex<Vec<usize>>,
        // call index (0-based) -> behavior
        faults: HashMap<usize, Fault>,
    }

    #[derive(Clone, Copy)]
    enum Fault {
        ShortVector,
        MissingVector,
        TransientOnce,
        Permanent,
    }

    impl MemEmbedder {
        fn new() -> Self {
            Self {
                call_sizes: Mutex::new(Vec::new()),
                faults: HashMap::new(),
            }
        }

        fn with_fault(mut self, call: usize, fault: Fault) -> Self {
            self.faults.insert(call, fault);
            self
        }

        fn calls(&self) -> Vec<usize> {
            self.call_sizes.lock().unwrap().clone()
        }

        fn encode(text: &str) -> Vec<f32> {
            let n: f32 = text
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .unwrap_or(-1.0);
            vec![n; DIM]
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MemEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = {
                let mut sizes = self.call_sizes.lock().unwrap();
                sizes.push(texts.len());
                sizes.len() - 1
            };

            let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| Self::encode(t)).collect();

            match self.faults.get(&call) {
                Some(Fault::ShortVector) => {
                    vectors[0].pop();
                }
                Some(Fault::MissingVector) => {
                    vectors.pop();
                }
                Some(Fault::TransientOnce) => {
                    return Err(EmbeddingError::ApiError {
                        status: 503,
                        message: "unavailable".to_string(),
                    });
                }
                Some(Fault::Permanent) => {
                    return Err(EmbeddingError::ApiError {
                        status: 400,
                        message: "bad request".to_string(),
                    });
                }
                None => {}
            }

            Ok(vectors)
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn job() -> SyncJob {
        SyncJob::new(16, DIM).with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("member {}", i)).collect()
    }

    #[tokio::test]
    async fn test_twenty_records_batch_sixteen() {
        let names = texts(20);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let store = MemStore::with_pending(&refs);
        let embedder = MemEmbedder::new();

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(embedder.calls(), vec![16, 4]);
        assert_eq!(report.pending, 20);
        assert_eq!(report.embedded, 20);
        assert_eq!(report.batches, 2);
        assert!(report.is_clean());
        assert_eq!(store.count_records().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = MemStore::with_pending(&["member 0", "member 1"]);
        let embedder = MemEmbedder::new();
        let progress = ProgressBar::hidden();

        let first = job().run(&store, &embedder, &progress).await.unwrap();
        assert_eq!(first.embedded, 2);
        let writes_after_first = store.write_count();

        let second = job().run(&store, &embedder, &progress).await.unwrap();
        assert_eq!(second.pending, 0);
        assert_eq!(second.batches, 0);
        assert_eq!(store.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn test_order_preserved_within_batches() {
        let names = texts(5);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let store = MemStore::with_pending(&refs);
        let embedder = MemEmbedder::new();

        let report = SyncJob::new(2, DIM)
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(report.embedded, 5);
        assert_eq!(embedder.calls(), vec![2, 2, 1]);

        // Each record got the vector derived from its own text.
        for (i, id) in store.ids().into_iter().enumerate() {
            assert_eq!(store.vector_for(id).unwrap(), vec![i as f32; DIM]);
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_skips_batch_and_continues() {
        let names = texts(6);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let store = MemStore::with_pending(&refs);
        let embedder = MemEmbedder::new().with_fault(1, Fault::ShortVector);

        let report = SyncJob::new(2, DIM)
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.embedded, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::DimensionMismatch);
        assert_eq!(report.failures[0].batch_index, 1);
        assert_eq!(report.failures[0].record_ids.len(), 2);

        // No record of the failed batch was written.
        let ids = store.ids();
        assert!(store.vector_for(ids[2]).is_none());
        assert!(store.vector_for(ids[3]).is_none());
        // Surrounding batches are intact.
        assert!(store.vector_for(ids[1]).is_some());
        assert!(store.vector_for(ids[4]).is_some());
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_run() {
        let names = texts(6);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let store = MemStore::with_pending(&refs);
        let embedder = MemEmbedder::new().with_fault(1, Fault::ShortVector);

        let result = SyncJob::new(2, DIM)
            .with_fail_fast(true)
            .run(&store, &embedder, &ProgressBar::hidden())
            .await;

        assert!(matches!(result, Err(SyncError::DimensionMismatch { .. })));
        // The third batch was never attempted.
        assert_eq!(embedder.calls(), vec![2, 2]);
        // Records written before the failure are untouched.
        assert_eq!(store.count_records().await.unwrap().embedded, 2);
    }

    #[tokio::test]
    async fn test_count_mismatch_recorded() {
        let store = MemStore::with_pending(&["member 0", "member 1"]);
        let embedder = MemEmbedder::new().with_fault(0, Fault::MissingVector);

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(report.embedded, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::CountMismatch);
    }

    #[tokio::test]
    async fn test_transient_embedding_error_is_retried() {
        let store = MemStore::with_pending(&["member 0"]);
        let embedder = MemEmbedder::new().with_fault(0, Fault::TransientOnce);

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.embedded, 1);
        // First call failed with 503, retry succeeded.
        assert_eq!(embedder.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_permanent_embedding_error_not_retried() {
        let store = MemStore::with_pending(&["member 0"]);
        let embedder = MemEmbedder::new()
            .with_fault(0, Fault::Permanent)
            .with_fault(1, Fault::Permanent);

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(embedder.calls().len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Embedding);
    }

    #[tokio::test]
    async fn test_store_write_failure_keeps_earlier_writes() {
        let names = texts(3);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut store = MemStore::with_pending(&refs);
        let ids = store.ids();
        store.fail_write_for = Some(ids[1]);
        let embedder = MemEmbedder::new();

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(report.embedded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Store);
        // Only the unwritten records of the batch are reported failed.
        assert_eq!(report.failures[0].record_ids, vec![ids[1], ids[2]]);
        assert!(store.vector_for(ids[0]).is_some());
    }

    #[tokio::test]
    async fn test_empty_store_does_nothing() {
        let store = MemStore::with_pending(&[]);
        let embedder = MemEmbedder::new();

        let report = job()
            .run(&store, &embedder, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(report.pending, 0);
        assert_eq!(report.batches, 0);
        assert!(embedder.calls().is_empty());
    }
}
