//! Job record repository.

use async_trait::async_trait;
use asyncjobs_core::JobId;
use asyncjobs_core::job::{JobRecord, JobStatus};
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::debug;

use crate::{DbError, DbResult};

/// Key-value store of job records.
///
/// `put` is an unconditional upsert: the whole record is replaced and the
/// last write for a key wins.
#[async_trait]
pub trait JobRepo: Send + Sync {
    async fn put(&self, record: &JobRecord) -> DbResult<()>;
    async fn get(&self, id: &JobId) -> DbResult<Option<JobRecord>>;

    /// Check that the store is reachable.
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    parameters: Option<String>,
    results: Option<String>,
    status: Option<String>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = DbError;

    fn try_from(row: JobRow) -> DbResult<Self> {
        let status = row
            .status
            .map(|s| s.parse::<JobStatus>())
            .transpose()
            .map_err(|e| DbError::Corrupt(format!("job {}: {}", row.id, e)))?;
        Ok(JobRecord {
            id: JobId::from(row.id),
            parameters: row.parameters,
            results: row.results,
            status,
        })
    }
}

/// PostgreSQL implementation of JobRepo.
pub struct PgJobRepo {
    pool: PgPool,
    table: String,
}

impl PgJobRepo {
    /// `table` must be a validated SQL identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn put(&self, record: &JobRecord) -> DbResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, parameters, results, status, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO UPDATE
            SET parameters = EXCLUDED.parameters,
                results = EXCLUDED.results,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(record.id.as_str())
            .bind(record.parameters.as_deref())
            .bind(record.results.as_deref())
            .bind(record.status.map(|s| s.as_str()))
            .execute(&self.pool)
            .await?;
        debug!(job_id = %record.id, table = %self.table, "Stored job record");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> DbResult<Option<JobRecord>> {
        let sql = format!(
            "SELECT id, parameters, results, status FROM {} WHERE id = $1",
            self.table
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRecord::try_from).transpose()
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory implementation of JobRepo for tests and local development.
///
/// Backed by a sharded map, so writes to different keys rarely contend.
#[derive(Debug, Default)]
pub struct InMemoryJobRepo {
    records: DashMap<JobId, JobRecord>,
}

impl InMemoryJobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl JobRepo for InMemoryJobRepo {
    async fn put(&self, record: &JobRecord) -> DbResult<()> {
        self.records.insert(record.id.clone(), record.clone());
        debug!(job_id = %record.id, "Stored job record");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> DbResult<Option<JobRecord>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = InMemoryJobRepo::new();
        assert!(repo.get(&JobId::from("nope")).await.unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_whole_record() {
        let repo = InMemoryJobRepo::new();
        let id = JobId::from("1");

        let failure = JobRecord::failure(id.clone(), &json!({ "seconds": 301 })).unwrap();
        repo.put(&failure).await.unwrap();

        let success = JobRecord::success(id.clone(), &json!({ "message": "done" })).unwrap();
        repo.put(&success).await.unwrap();

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(stored, success);
        assert!(stored.parameters.is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_different_keys() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let record =
                    JobRecord::success(JobId::from(i.to_string()), &json!({ "n": i })).unwrap();
                repo.put(&record).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(repo.len(), 32);
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupt() {
        let row = JobRow {
            id: "1".to_string(),
            parameters: None,
            results: None,
            status: Some("Pending".to_string()),
        };
        assert!(matches!(JobRecord::try_from(row), Err(DbError::Corrupt(_))));
    }

    /// Requires a running PostgreSQL.
    /// Run with: DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_postgres_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = crate::create_pool(&url).await.unwrap();
        crate::ensure_schema(&pool, "jobs_test").await.unwrap();
        let repo = PgJobRepo::new(pool, "jobs_test");
        repo.ping().await.unwrap();

        let id = JobId::generate();
        assert!(repo.get(&id).await.unwrap().is_none());

        let record = JobRecord::failure(id.clone(), &json!({ "seconds": 301 })).unwrap();
        repo.put(&record).await.unwrap();
        assert_eq!(repo.get(&id).await.unwrap(), Some(record));

        let record = JobRecord::success(id.clone(), &json!({ "message": "ok" })).unwrap();
        repo.put(&record).await.unwrap();
        assert_eq!(repo.get(&id).await.unwrap(), Some(record));
    }
}
