//! In-process implementation of the ingest repository.
//!
//! Transactions take an exclusive lock on the shared state and work on a
//! copy of it; `commit` writes the copy back. Foreign keys and the unique
//! `(suite_id, name)` constraint on test cases are enforced. A [`FaultPlan`]
//! injects store failures for tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use super::error::StoreError;
use super::port::{
    BatchResult, IngestRepository, IngestTx, NewBuild, NewExecution, NewFailure, SuiteRef,
    TestCaseRef,
};
use crate::models::ExecutionStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRow {
    pub id: i64,
    pub suite_id: i64,
    pub name: String,
    pub classname: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildRow {
    pub id: i64,
    pub test_suite_id: i64,
    pub project_id: i64,
    pub build_number: String,
    pub ci_provider: String,
    pub ci_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    pub test_case_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRow {
    pub id: i64,
    pub build_id: i64,
    pub test_case_id: i64,
    pub status: ExecutionStatus,
    pub execution_time: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRow {
    pub id: i64,
    pub execution_id: i64,
    pub message: Option<String>,
    pub failure_type: Option<String>,
    pub details: Option<String>,
}

/// Committed contents of a [`MemoryRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub projects: Vec<ProjectRow>,
    pub suites: Vec<SuiteRow>,
    pub test_cases: Vec<TestCaseRow>,
    pub builds: Vec<BuildRow>,
    pub executions: Vec<ExecutionRow>,
    pub failures: Vec<FailureRow>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn test_case_name(&self, test_case_id: i64) -> Option<&str> {
        self.test_cases
            .iter()
            .find(|tc| tc.id == test_case_id)
            .map(|tc| tc.name.as_str())
    }

    /// Executions of a build, in insertion order.
    pub fn executions_of(&self, build_id: i64) -> Vec<&ExecutionRow> {
        self.executions
            .iter()
            .filter(|e| e.build_id == build_id)
            .collect()
    }

    pub fn build(&self, build_id: i64) -> Option<&BuildRow> {
        self.builds.iter().find(|b| b.id == build_id)
    }

    pub fn failure_of(&self, execution_id: i64) -> Option<&FailureRow> {
        self.failures
            .iter()
            .find(|f| f.execution_id == execution_id)
    }
}

/// Store failures to inject, keyed by test case name where per-row.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub fail_begin: bool,
    pub fail_build_insert: bool,
    pub fail_count_update: bool,
    pub fail_commit: bool,
    /// `insert_test_case` fails for these names
    pub fail_test_case_insert: Vec<String>,
    /// Execution rows for these test cases are rejected
    pub fail_execution_rows: Vec<String>,
    /// Failure rows for these test cases are rejected
    pub fail_failure_rows: Vec<String>,
    /// Before inserting `name`, a concurrent writer commits it with the given classname
    pub race_test_case_insert: Vec<(String, String)>,
    /// Cancelled right after the build row is inserted
    pub cancel_after_build_insert: Option<CancellationToken>,
}

/// Shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultPlan>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        MemoryRepository {
            state: self.state,
            faults: Arc::new(faults),
        }
    }

    pub async fn add_project(&self, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.projects.push(ProjectRow {
            id,
            name: name.to_string(),
        });
        id
    }

    pub async fn add_suite(&self, project_id: i64, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.suites.push(SuiteRow {
            id,
            project_id,
            name: name.to_string(),
            parent_id: None,
            time: 0.0,
        });
        id
    }

    pub async fn add_test_case(&self, suite_id: i64, name: &str, classname: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.test_cases.push(TestCaseRow {
            id,
            suite_id,
            name: name.to_string(),
            classname: classname.to_string(),
        });
        id
    }

    /// Copy of the committed state. Waits for any open transaction to finish.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl IngestRepository for MemoryRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        if self.faults.fail_begin {
            return Err(StoreError::Database("connection refused".to_string()));
        }
        let committed = self.state.clone().lock_owned().await;
        let working = committed.clone();
        Ok(MemoryTx {
            committed,
            working,
            faults: self.faults.clone(),
        })
    }
}

/// Transaction over a [`MemoryRepository`].
pub struct MemoryTx {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultPlan>,
}

impl MemoryTx {
    fn check_test_case_unique(&self, suite_id: i64, name: &str) -> Result<(), StoreError> {
        if self
            .working
            .test_cases
            .iter()
            .any(|tc| tc.suite_id == suite_id && tc.name == name)
        {
            return Err(StoreError::UniqueViolation(format!(
                "test_cases (suite_id, name) = ({}, {})",
                suite_id, name
            )));
        }
        Ok(())
    }

    fn insert_execution(&mut self, row: &NewExecution) -> Result<i64, StoreError> {
        if self.working.build(row.build_id).is_none() {
            return Err(StoreError::ForeignKeyViolation(format!(
                "build {} does not exist",
                row.build_id
            )));
        }
        let name = self
            .working
            .test_case_name(row.test_case_id)
            .ok_or_else(|| {
                StoreError::ForeignKeyViolation(format!(
                    "test case {} does not exist",
                    row.test_case_id
                ))
            })?;
        if self.faults.fail_execution_rows.iter().any(|n| n == name) {
            return Err(StoreError::Database(format!(
                "injected execution failure for '{}'",
                name
            )));
        }

        let id = self.working.allocate_id();
        self.working.executions.push(ExecutionRow {
            id,
            build_id: row.build_id,
            test_case_id: row.test_case_id,
            status: row.status,
            execution_time: row.execution_time,
            note: row.note.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn insert_failure(&mut self, row: &NewFailure) -> Result<i64, StoreError> {
        let test_case_id = self
            .working
            .executions
            .iter()
            .find(|e| e.id == row.execution_id)
            .map(|e| e.test_case_id)
            .ok_or_else(|| {
                StoreError::ForeignKeyViolation(format!(
                    "execution {} does not exist",
                    row.execution_id
                ))
            })?;
        if self.working.failure_of(row.execution_id).is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "failures (build_test_case_execution_id) = ({})",
                row.execution_id
            )));
        }
        if let Some(name) = self.working.test_case_name(test_case_id)
            && self.faults.fail_failure_rows.iter().any(|n| n == name)
        {
            return Err(StoreError::Database(format!(
                "injected failure-row failure for '{}'",
                name
            )));
        }

        let id = self.working.allocate_id();
        self.working.failures.push(FailureRow {
            id,
            execution_id: row.execution_id,
            message: row.message.clone(),
            failure_type: row.failure_type.clone(),
            details: row.details.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl IngestTx for MemoryTx {
    async fn lookup_suite(&mut self, suite_id: i64) -> Result<Option<SuiteRef>, StoreError> {
        Ok(self
            .working
            .suites
            .iter()
            .find(|s| s.id == suite_id)
            .map(|s| SuiteRef {
                id: s.id,
                project_id: s.project_id,
                name: s.name.clone(),
            }))
    }

    async fn get_test_case_by_suite_and_name(
        &mut self,
        suite_id: i64,
        name: &str,
    ) -> Result<Option<TestCaseRef>, StoreError> {
        Ok(self
            .working
            .test_cases
            .iter()
            .find(|tc| tc.suite_id == suite_id && tc.name == name)
            .map(|tc| TestCaseRef {
                id: tc.id,
                suite_id: tc.suite_id,
                name: tc.name.clone(),
                classname: tc.classname.clone(),
            }))
    }

    async fn insert_test_case(
        &mut self,
        suite_id: i64,
        name: &str,
        classname: &str,
    ) -> Result<i64, StoreError> {
        if self.faults.fail_test_case_insert.iter().any(|n| n == name) {
            return Err(StoreError::Database(format!(
                "injected test case failure for '{}'",
                name
            )));
        }

        if let Some((_, winner)) = self
            .faults
            .race_test_case_insert
            .iter()
            .find(|(n, _)| n == name)
            && self.check_test_case_unique(suite_id, name).is_ok()
        {
            // Committed by the other writer, so it lands in both copies.
            let id = self.committed.next_id.max(self.working.next_id) + 1;
            self.committed.next_id = id;
            self.working.next_id = id;
            let row = TestCaseRow {
                id,
                suite_id,
                name: name.to_string(),
                classname: winner.clone(),
            };
            self.committed.test_cases.push(row.clone());
            self.working.test_cases.push(row);
        }

        if !self.working.suites.iter().any(|s| s.id == suite_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "suite {} does not exist",
                suite_id
            )));
        }
        self.check_test_case_unique(suite_id, name)?;

        let id = self.working.allocate_id();
        self.working.test_cases.push(TestCaseRow {
            id,
            suite_id,
            name: name.to_string(),
            classname: classname.to_string(),
        });
        Ok(id)
    }

    async fn insert_build(&mut self, build: &NewBuild) -> Result<i64, StoreError> {
        if self.faults.fail_build_insert {
            return Err(StoreError::Database("injected build failure".to_string()));
        }
        if !self.working.suites.iter().any(|s| s.id == build.test_suite_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "suite {} does not exist",
                build.test_suite_id
            )));
        }

        let id = self.working.allocate_id();
        self.working.builds.push(BuildRow {
            id,
            test_suite_id: build.test_suite_id,
            project_id: build.project_id,
            build_number: build.build_number.clone(),
            ci_provider: build.ci_provider.clone(),
            ci_url: build.ci_url.clone(),
            created_at: Utc::now(),
            started_at: build.started_at,
            ended_at: build.ended_at,
            duration: build.duration,
            test_case_count: 0,
        });

        if let Some(token) = &self.faults.cancel_after_build_insert {
            token.cancel();
        }
        Ok(id)
    }

    async fn update_build_test_case_count(
        &mut self,
        build_id: i64,
        count: i64,
    ) -> Result<(), StoreError> {
        if self.faults.fail_count_update {
            return Err(StoreError::Database("injected count failure".to_string()));
        }
        let build = self
            .working
            .builds
            .iter_mut()
            .find(|b| b.id == build_id)
            .ok_or(StoreError::NotFound)?;
        build.test_case_count = count;
        Ok(())
    }

    async fn insert_executions(
        &mut self,
        rows: &[NewExecution],
    ) -> Result<BatchResult, StoreError> {
        Ok(rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index, self.insert_execution(row)))
            .collect())
    }

    async fn insert_failures(&mut self, rows: &[NewFailure]) -> Result<BatchResult, StoreError> {
        Ok(rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index, self.insert_failure(row)))
            .collect())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.faults.fail_commit {
            return Err(StoreError::Database("injected commit failure".to_string()));
        }
        *self.committed = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
