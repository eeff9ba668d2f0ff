//! PostgreSQL/pgvector record store.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{MatchCandidate, PendingRecord, RecordCounts, StoreConfig};

/// Abstract store for member match records.
///
/// The sync and match commands depend on this trait so they can run
/// against an in-memory store in tests.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check connectivity.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Create the collection table and vector index if missing.
    async fn ensure_collection(&self) -> Result<(), StoreError>;

    /// Total / embedded / pending counts over the collection.
    async fn count_records(&self) -> Result<RecordCounts, StoreError>;

    /// Records with identity text and no embedding, id + text projection only.
    async fn fetch_pending(&self, limit: Option<i64>) -> Result<Vec<PendingRecord>, StoreError>;

    /// Point update of one record's embedding by id. Last write wins.
    async fn write_embedding(&self, id: Uuid, vector: &[f32]) -> Result<(), StoreError>;

    /// Stored embedding for a record, if any.
    async fn fetch_embedding(&self, id: Uuid) -> Result<Option<Vec<f32>>, StoreError>;

    /// A random record that already has an embedding.
    async fn sample_embedded(&self) -> Result<Option<Uuid>, StoreError>;

    /// Nearest records by cosine similarity, excluding the probe record.
    async fn nearest(
        &self,
        query: &[f32],
        exclude: Uuid,
        limit: u64,
    ) -> Result<Vec<MatchCandidate>, StoreError>;

    fn collection(&self) -> &str;
}

pub struct PgRecordStore {
    pool: PgPool,
    collection: String,
    dimension: u32,
}

impl PgRecordStore {
    pub async fn new(config: &StoreConfig, dimension: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self {
            pool,
            collection: config.collection.clone(),
            dimension,
        };

        store.check_pgvector_extension().await?;

        Ok(store)
    }

    async fn check_pgvector_extension(&self) -> Result<(), StoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::QueryError(e.to_string()))?;

        if result.is_none() {
            return Err(StoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), StoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                first_name TEXT,
                last_name TEXT,
                birth_date TEXT,
                member_group_id TEXT,
                identity_text TEXT,
                identity_embedding vector({})
            )
            "#,
            self.collection, self.dimension
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::CollectionError(e.to_string()))?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {}_identity_embedding_idx ON {} \
             USING hnsw (identity_embedding vector_cosine_ops)",
            self.collection, self.collection
        );

        sqlx::query(&create_index)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn count_records(&self) -> Result<RecordCounts, StoreError> {
        let query = format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(identity_embedding) AS embedded,
                COUNT(*) FILTER (
                    WHERE identity_text IS NOT NULL AND identity_embedding IS NULL
                ) AS pending
            FROM {}
            "#,
            self.collection
        );

        let row: (i64, i64, i64) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(RecordCounts {
            total: row.0 as u64,
            embedded: row.1 as u64,
            pending: row.2 as u64,
        })
    }

    async fn fetch_pending(&self, limit: Option<i64>) -> Result<Vec<PendingRecord>, StoreError> {
        let mut query = format!(
            "SELECT id, identity_text FROM {} \
             WHERE identity_text IS NOT NULL AND identity_embedding IS NULL \
             ORDER BY id",
            self.collection
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, identity_text)| PendingRecord { id, identity_text })
            .collect())
    }

    async fn write_embedding(&self, id: Uuid, vector: &[f32]) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET identity_embedding = $1 WHERE id = $2",
            self.collection
        );

        let embedding = Vector::from(vector.to_vec());
        let result = sqlx::query(&query)
            .bind(&embedding)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::UpdateError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn fetch_embedding(&self, id: Uuid) -> Result<Option<Vec<f32>>, StoreError> {
        let query = format!(
            "SELECT identity_embedding FROM {} WHERE id = $1",
            self.collection
        );

        let row: Option<(Option<Vector>,)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound(id.to_string())),
            Some((embedding,)) => Ok(embedding.map(|v| v.to_vec())),
        }
    }

    async fn sample_embedded(&self) -> Result<Option<Uuid>, StoreError> {
        let query = format!(
            "SELECT id FROM {} WHERE identity_embedding IS NOT NULL \
             ORDER BY random() LIMIT 1",
            self.collection
        );

        let row: Option<(Uuid,)> = sqlx::query_as(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(row.map(|(id,)| id))
    }

    async fn nearest(
        &self,
        query_vector: &[f32],
        exclude: Uuid,
        limit: u64,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        let embedding = Vector::from(query_vector.to_vec());

        let query = format!(
            r#"
            SELECT
                id,
                1 - (identity_embedding <=> $1) AS score,
                first_name,
                last_name,
                birth_date,
                member_group_id
            FROM {}
            WHERE id <> $2 AND identity_embedding IS NOT NULL
            ORDER BY identity_embedding <=> $1
            LIMIT {}
            "#,
            self.collection, limit
        );

        let rows = sqlx::query(&query)
            .bind(&embedding)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        let candidates = rows
            .into_iter()
            .map(|row: PgRow| {
                let score: f64 = row.get("score");
                MatchCandidate {
                    id: row.get("id"),
                    score: score as f32,
                    first_name: row.get("first_name"),
                    last_name: row.get("last_name"),
                    birth_date: row.get("birth_date"),
                    member_group_id: row.get("member_group_id"),
                }
            })
            .collect();

        Ok(candidates)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
