//! Ingest coordinator: turns a decoded report into one committed build.
//!
//! One import is one transaction. Suite ownership, the build row, test case
//! resolution, executions, failures and the final count update all happen on
//! it, in report order. Per-element problems are collected as
//! [`ProcessingError`]s and do not prevent the commit; anything listed in
//! [`ImportError`] rolls the whole attempt back.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{FailurePayload, classify};
use super::error::{ImportError, ProcessingError, StoreError};
use super::port::{IngestRepository, IngestTx, NewBuild, NewExecution, NewFailure, cancellable};
use super::report::Report;
use super::resolver::EntityResolver;

/// CI provider recorded on imported builds.
pub const JUNIT_CI_PROVIDER: &str = "JUnit Import";

/// Result of a committed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub build_id: i64,
    /// Non-fatal problems, in the order they were found
    pub processing_errors: Vec<ProcessingError>,
}

/// An execution waiting for the batch insert.
struct Staged {
    test_case: String,
    row: NewExecution,
    failure: Option<FailurePayload>,
}

/// Imports JUnit reports through an [`IngestRepository`].
pub struct JunitImporter<R> {
    repo: R,
}

impl<R: IngestRepository> JunitImporter<R> {
    pub fn new(repo: R) -> Self {
        JunitImporter { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Persist `report` as a new build of `suite_id`.
    ///
    /// Every store call observes `cancel`; once it fires the transaction is
    /// rolled back and [`ImportError::Canceled`] is returned.
    pub async fn process_report(
        &self,
        cancel: &CancellationToken,
        project_id: i64,
        suite_id: i64,
        report: &Report,
    ) -> Result<ImportOutcome, ImportError> {
        if project_id <= 0 || suite_id <= 0 {
            return Err(ImportError::InvalidIds {
                project_id,
                suite_id,
            });
        }

        let mut tx = cancellable(cancel, self.repo.begin())
            .await
            .map_err(|e| ImportError::phase(e, ImportError::TxBeginFailed))?;

        let outcome = match import(&mut tx, cancel, project_id, suite_id, report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                rollback(tx).await;
                warn!(
                    "JUnit import into suite {} of project {} failed: {}",
                    suite_id, project_id, err
                );
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            rollback(tx).await;
            warn!(
                "JUnit import into suite {} canceled before commit",
                suite_id
            );
            return Err(ImportError::Canceled);
        }

        tx.commit()
            .await
            .map_err(|e| ImportError::phase(e, ImportError::CommitFailed))?;

        info!(
            build_id = outcome.build_id,
            project_id,
            suite_id,
            cases = report.case_count(),
            processing_errors = outcome.processing_errors.len(),
            "JUnit import committed"
        );

        Ok(outcome)
    }
}

/// Object-safe view of [`JunitImporter`] for the HTTP layer.
#[async_trait]
pub trait ReportImporter: Send + Sync {
    async fn import_report(
        &self,
        cancel: &CancellationToken,
        project_id: i64,
        suite_id: i64,
        report: &Report,
    ) -> Result<ImportOutcome, ImportError>;
}

#[async_trait]
impl<R: IngestRepository> ReportImporter for JunitImporter<R> {
    async fn import_report(
        &self,
        cancel: &CancellationToken,
        project_id: i64,
        suite_id: i64,
        report: &Report,
    ) -> Result<ImportOutcome, ImportError> {
        self.process_report(cancel, project_id, suite_id, report)
            .await
    }
}

async fn rollback<T: IngestTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!("Failed to roll back JUnit import: {}", e);
    }
}

async fn import<T: IngestTx>(
    tx: &mut T,
    cancel: &CancellationToken,
    project_id: i64,
    suite_id: i64,
    report: &Report,
) -> Result<ImportOutcome, ImportError> {
    let mut resolver = EntityResolver::new();
    let mut errors = Vec::new();

    resolver
        .validate_suite_in_project(tx, cancel, project_id, suite_id)
        .await?;

    let build_id = cancellable(cancel, tx.insert_build(&new_build(project_id, suite_id, report)))
        .await
        .map_err(|e| ImportError::phase(e, ImportError::BuildInsertFailed))?;
    debug!("Created build {} for suite {}", build_id, suite_id);

    // Resolve and classify every case, in document order.
    let mut staged = Vec::with_capacity(report.case_count());
    for suite in &report.suites {
        for case in &suite.cases {
            if case.name.trim().is_empty() {
                errors.push(ProcessingError::TestCaseResolution {
                    suite: suite.name.clone(),
                    name: case.name.clone(),
                    classname: case.classname.clone(),
                    cause: "test case has no name".to_string(),
                });
                continue;
            }

            let resolved = match resolver
                .find_or_create_test_case(tx, cancel, suite_id, &case.name, &case.classname)
                .await
            {
                Ok(resolved) => resolved,
                Err(StoreError::Canceled) => return Err(ImportError::Canceled),
                Err(e) => {
                    errors.push(ProcessingError::TestCaseResolution {
                        suite: suite.name.clone(),
                        name: case.name.clone(),
                        classname: case.classname.clone(),
                        cause: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(expected) = resolved.classname_conflict {
                errors.push(ProcessingError::ClassNameMismatch {
                    suite: suite.name.clone(),
                    name: case.name.clone(),
                    expected,
                    actual: case.classname.clone(),
                });
            }

            let classification = classify(case);
            staged.push(Staged {
                test_case: case.name.clone(),
                row: NewExecution {
                    build_id,
                    test_case_id: resolved.test_case_id,
                    status: classification.status,
                    execution_time: case.time,
                    note: classification.note,
                },
                failure: classification
                    .failure
                    .filter(|_| classification.status.carries_failure()),
            });
        }
    }

    // Executions
    let mut inserted = 0i64;
    let mut failures = Vec::new();
    let mut failure_owners = Vec::new();
    if !staged.is_empty() {
        let rows: Vec<NewExecution> = staged.iter().map(|s| s.row.clone()).collect();
        let mut results = cancellable(cancel, tx.insert_executions(&rows))
            .await
            .map_err(ImportError::store)?;
        results.sort_by_key(|(index, _)| *index);

        for (index, result) in results {
            let Some(entry) = staged.get_mut(index) else {
                continue;
            };
            match result {
                Ok(execution_id) => {
                    inserted += 1;
                    if let Some(payload) = entry.failure.take() {
                        failures.push(NewFailure {
                            execution_id,
                            message: payload.message,
                            failure_type: payload.failure_type,
                            details: payload.details,
                        });
                        failure_owners.push(entry.test_case.clone());
                    }
                }
                Err(StoreError::Canceled) => return Err(ImportError::Canceled),
                Err(e) => errors.push(ProcessingError::ExecutionInsert {
                    index,
                    test_case: entry.test_case.clone(),
                    cause: e.to_string(),
                }),
            }
        }
    }

    // Failures
    if !failures.is_empty() {
        let mut results = cancellable(cancel, tx.insert_failures(&failures))
            .await
            .map_err(ImportError::store)?;
        results.sort_by_key(|(index, _)| *index);

        for (index, result) in results {
            match result {
                Ok(_) => {}
                Err(StoreError::Canceled) => return Err(ImportError::Canceled),
                Err(e) => errors.push(ProcessingError::FailureInsert {
                    index,
                    test_case: failure_owners.get(index).cloned().unwrap_or_default(),
                    cause: e.to_string(),
                }),
            }
        }
    }

    cancellable(cancel, tx.update_build_test_case_count(build_id, inserted))
        .await
        .map_err(ImportError::store)?;

    if !errors.is_empty() {
        debug!(
            "Build {} has {} processing errors",
            build_id,
            errors.len()
        );
    }

    Ok(ImportOutcome {
        build_id,
        processing_errors: errors,
    })
}

fn new_build(project_id: i64, suite_id: i64, report: &Report) -> NewBuild {
    let started_at = report.started_at();
    let total = report.total_time();
    let duration = (!report.suites.is_empty()).then_some(total);
    let ended_at = started_at.and_then(|start| {
        chrono::Duration::try_milliseconds((total * 1000.0).round() as i64)
            .and_then(|elapsed| start.checked_add_signed(elapsed))
    });

    NewBuild {
        test_suite_id: suite_id,
        project_id,
        build_number: report.build_label().to_string(),
        ci_provider: JUNIT_CI_PROVIDER.to_string(),
        ci_url: None,
        started_at,
        ended_at,
        duration,
    }
}
