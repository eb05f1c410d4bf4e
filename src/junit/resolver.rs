//! Entity resolution: suite ownership checks and find-or-create of test cases.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{ImportError, StoreError};
use super::port::{IngestTx, SuiteRef, cancellable};

/// Result of [`EntityResolver::find_or_create_test_case`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub test_case_id: i64,
    /// True when this call inserted the row
    pub created: bool,
    /// Stored classname, when it differs from the requested one
    pub classname_conflict: Option<String>,
}

/// Resolves report entities against stored rows for one import.
///
/// The cache lives as long as the resolver, which is created per import.
#[derive(Debug, Default)]
pub struct EntityResolver {
    cache: HashMap<(i64, String), (i64, String)>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `suite_id` exists and belongs to `project_id`.
    pub async fn validate_suite_in_project<T: IngestTx>(
        &self,
        tx: &mut T,
        cancel: &CancellationToken,
        project_id: i64,
        suite_id: i64,
    ) -> Result<SuiteRef, ImportError> {
        let not_in_project = ImportError::SuiteNotInProject {
            project_id,
            suite_id,
        };

        match cancellable(cancel, tx.lookup_suite(suite_id)).await {
            Ok(Some(suite)) if suite.project_id == project_id => Ok(suite),
            Ok(Some(suite)) => {
                debug!(
                    "Suite {} belongs to project {}, not {}",
                    suite_id, suite.project_id, project_id
                );
                Err(not_in_project)
            }
            Ok(None) | Err(StoreError::NotFound) => Err(not_in_project),
            Err(e) => Err(ImportError::store(e)),
        }
    }

    /// Find a test case by `(suite_id, name)` or insert it.
    ///
    /// An existing row always wins; a differing classname is returned in
    /// [`Resolved::classname_conflict`]. A unique violation on insert means
    /// another import created the row first, so it is read back instead.
    pub async fn find_or_create_test_case<T: IngestTx>(
        &mut self,
        tx: &mut T,
        cancel: &CancellationToken,
        suite_id: i64,
        name: &str,
        classname: &str,
    ) -> Result<Resolved, StoreError> {
        let key = (suite_id, name.to_string());
        if let Some((id, stored)) = self.cache.get(&key) {
            return Ok(existing(*id, stored, classname));
        }

        if let Some(found) =
            cancellable(cancel, tx.get_test_case_by_suite_and_name(suite_id, name)).await?
        {
            let resolved = existing(found.id, &found.classname, classname);
            self.cache.insert(key, (found.id, found.classname));
            return Ok(resolved);
        }

        match cancellable(cancel, tx.insert_test_case(suite_id, name, classname)).await {
            Ok(id) => {
                self.cache.insert(key, (id, classname.to_string()));
                Ok(Resolved {
                    test_case_id: id,
                    created: true,
                    classname_conflict: None,
                })
            }
            Err(StoreError::UniqueViolation(cause)) => {
                debug!("Test case '{}' created concurrently, re-reading", name);
                let winner =
                    cancellable(cancel, tx.get_test_case_by_suite_and_name(suite_id, name))
                        .await?
                        .ok_or(StoreError::UniqueViolation(cause))?;
                let resolved = existing(winner.id, &winner.classname, classname);
                self.cache.insert(key, (winner.id, winner.classname));
                Ok(resolved)
            }
            Err(e) => Err(e),
        }
    }
}

fn existing(id: i64, stored: &str, requested: &str) -> Resolved {
    Resolved {
        test_case_id: id,
        created: false,
        classname_conflict: (stored != requested).then(|| stored.to_string()),
    }
}
