//! Storage contract used by the import coordinator.
//!
//! Every operation runs inside one transaction obtained from
//! [`IngestRepository::begin`]. The PostgreSQL adapter lives in
//! `db::ingest`; `junit::memory` (feature `test-support`) provides an in-process implementation.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::error::StoreError;
use crate::models::ExecutionStatus;

/// A suite as seen by the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteRef {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

/// A stored test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRef {
    pub id: i64,
    pub suite_id: i64,
    pub name: String,
    pub classname: String,
}

/// Fields of a build row. `created_at` is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBuild {
    pub test_suite_id: i64,
    pub project_id: i64,
    pub build_number: String,
    pub ci_provider: String,
    pub ci_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub build_id: i64,
    pub test_case_id: i64,
    pub status: ExecutionStatus,
    pub execution_time: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFailure {
    pub execution_id: i64,
    pub message: Option<String>,
    pub failure_type: Option<String>,
    pub details: Option<String>,
}

/// Per-row outcome of a batch insert: `(index in batch, inserted id or error)`.
pub type BatchResult = Vec<(usize, Result<i64, StoreError>)>;

/// Entry point of the storage contract.
#[async_trait]
pub trait IngestRepository: Send + Sync + 'static {
    type Tx: IngestTx;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// An open import transaction.
///
/// `commit` and `rollback` consume the handle. Dropping a handle without
/// committing discards its writes.
#[async_trait]
pub trait IngestTx: Send + Sized {
    async fn lookup_suite(&mut self, suite_id: i64) -> Result<Option<SuiteRef>, StoreError>;

    async fn get_test_case_by_suite_and_name(
        &mut self,
        suite_id: i64,
        name: &str,
    ) -> Result<Option<TestCaseRef>, StoreError>;

    /// Insert a test case. Fails with [`StoreError::UniqueViolation`] when
    /// `(suite_id, name)` already exists.
    async fn insert_test_case(
        &mut self,
        suite_id: i64,
        name: &str,
        classname: &str,
    ) -> Result<i64, StoreError>;

    async fn insert_build(&mut self, build: &NewBuild) -> Result<i64, StoreError>;

    async fn update_build_test_case_count(
        &mut self,
        build_id: i64,
        count: i64,
    ) -> Result<(), StoreError>;

    /// Insert rows in order. A rejected row does not affect the others.
    async fn insert_executions(
        &mut self,
        rows: &[NewExecution],
    ) -> Result<BatchResult, StoreError>;

    /// Insert rows in order. A rejected row does not affect the others.
    async fn insert_failures(&mut self, rows: &[NewFailure]) -> Result<BatchResult, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Run a store call unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Canceled),
        result = call => result,
    }
}
