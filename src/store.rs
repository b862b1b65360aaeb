//! Job record store.
//!
//! A single-row point lookup keyed by [`JobId`]. Records are written by the
//! submission path and advanced by the execution backend; this crate only
//! reads them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use crate::config::DatabaseConfig;
use crate::error::JobStoreError;
use crate::job::{JobId, JobRecord, JobStatus, RunId};

/// Default bound on a single lookup.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

const SELECT_JOB: &str = "SELECT id, jobid, jobstatus, requestid, query, destination, tokenid \
     FROM emr_job_details WHERE id = $1";

/// Read access to persisted job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch the record for `id`. No retries.
    async fn get(&self, id: &JobId) -> Result<JobRecord, JobStoreError>;
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    jobid: String,
    jobstatus: String,
    requestid: String,
    query: String,
    destination: String,
    tokenid: Option<String>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        Self {
            id: JobId(row.id),
            run_id: RunId(row.jobid),
            status: JobStatus::from(row.jobstatus),
            request_id: row.requestid,
            query: row.query,
            destination: row.destination,
            caller_claim: row.tokenid,
        }
    }
}

/// [`JobStore`] over the `emr_job_details` Postgres table.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgJobStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Creates a pool that connects on first use.
    pub fn connect_lazy(db: &DatabaseConfig, timeout: Duration) -> Self {
        let options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.name)
            .ssl_mode(PgSslMode::Disable);
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(timeout)
            .connect_lazy_with(options);
        Self::new(pool, timeout)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, id: &JobId) -> Result<JobRecord, JobStoreError> {
        let query = async {
            sqlx::query_as::<_, JobRow>(SELECT_JOB)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| JobStoreError::Unavailable {
                    detail: e.to_string(),
                })?
                .map(JobRecord::from)
                .ok_or(JobStoreError::NotFound)
        };
        within_deadline(self.timeout, query).await
    }
}

/// Bounds a lookup; a missed deadline becomes [`JobStoreError::Timeout`].
pub(crate) async fn within_deadline<F>(
    deadline: Duration,
    lookup: F,
) -> Result<JobRecord, JobStoreError>
where
    F: Future<Output = Result<JobRecord, JobStoreError>>,
{
    tokio::time::timeout(deadline, lookup)
        .await
        .unwrap_or(Err(JobStoreError::Timeout(deadline)))
}

/// In-process [`JobStore`] for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: JobRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> Result<JobRecord, JobStoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or(JobStoreError::NotFound)
    }
}
