//! Error types for the JUnit ingestion pipeline.
//!
//! Fatal problems abort the import ([`ImportError`]); per-element problems
//! are collected and returned with the committed build ([`ProcessingError`]).

use std::fmt;

/// The document is neither a `<testsuites>` nor a `<testsuite>` root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid XML. Not <testsuites> ({as_suites}) or <testsuite> ({as_suite}) root")]
pub struct DecodeError {
    /// Why the document did not decode as `<testsuites>`
    pub as_suites: String,
    /// Why the document did not decode as `<testsuite>`
    pub as_suite: String,
}

/// Errors raised by a repository implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("operation canceled")]
    Canceled,

    #[error("database error: {0}")]
    Database(String),
}

/// Fatal import errors. Nothing from the attempt is persisted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    MalformedXml(#[from] DecodeError),

    #[error("Invalid ids: project {project_id} and suite {suite_id} must be positive")]
    InvalidIds { project_id: i64, suite_id: i64 },

    #[error("Test suite {suite_id} not found in project {project_id}")]
    SuiteNotInProject { project_id: i64, suite_id: i64 },

    #[error("Failed to begin transaction: {0}")]
    TxBeginFailed(StoreError),

    #[error("Failed to create build: {0}")]
    BuildInsertFailed(StoreError),

    #[error("Failed to commit transaction: {0}")]
    CommitFailed(StoreError),

    #[error("Import canceled")]
    Canceled,

    #[error("Storage error during import: {0}")]
    Store(StoreError),
}

impl ImportError {
    /// Wrap a store error raised outside the named phases.
    pub(crate) fn store(err: StoreError) -> Self {
        match err {
            StoreError::Canceled => ImportError::Canceled,
            other => ImportError::Store(other),
        }
    }

    /// Wrap a store error, keeping cancellation distinct from `wrap`.
    pub(crate) fn phase(err: StoreError, wrap: fn(StoreError) -> ImportError) -> Self {
        match err {
            StoreError::Canceled => ImportError::Canceled,
            other => wrap(other),
        }
    }
}

/// Non-fatal, per-element import problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The test case could not be found or created; the case was skipped.
    TestCaseResolution {
        suite: String,
        name: String,
        classname: String,
        cause: String,
    },
    /// The stored classname differs; the stored row was kept.
    ClassNameMismatch {
        suite: String,
        name: String,
        expected: String,
        actual: String,
    },
    /// An execution row was rejected by the store.
    ExecutionInsert {
        index: usize,
        test_case: String,
        cause: String,
    },
    /// A failure row was rejected by the store.
    FailureInsert {
        index: usize,
        test_case: String,
        cause: String,
    },
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestCaseResolution {
                suite,
                name,
                classname,
                cause,
            } => write!(
                f,
                "Error finding/creating test case '{}' (class: '{}', suite: '{}'): {}",
                name, classname, suite, cause
            ),
            Self::ClassNameMismatch {
                suite,
                name,
                expected,
                actual,
            } => write!(
                f,
                "Test case '{}' in suite '{}' already exists with class '{}'; report has '{}'",
                name, suite, expected, actual
            ),
            Self::ExecutionInsert {
                index,
                test_case,
                cause,
            } => write!(
                f,
                "Error recording execution #{} for test case '{}': {}",
                index, test_case, cause
            ),
            Self::FailureInsert {
                index,
                test_case,
                cause,
            } => write!(
                f,
                "Error recording failure #{} for test case '{}': {}",
                index, test_case, cause
            ),
        }
    }
}
