//! Status classification for decoded test cases.

use super::report::{Case, Fault};
use crate::models::ExecutionStatus;

/// Failure metadata recorded for failed and errored executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailurePayload {
    pub message: Option<String>,
    pub failure_type: Option<String>,
    pub details: Option<String>,
}

impl From<&Fault> for FailurePayload {
    fn from(fault: &Fault) -> Self {
        FailurePayload {
            message: fault.message.clone(),
            failure_type: fault.kind.clone(),
            details: fault.details.clone(),
        }
    }
}

/// Status of one case plus whatever should be stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: ExecutionStatus,
    /// Present only for `failed` and `error`
    pub failure: Option<FailurePayload>,
    /// Skip reason, stored on the execution row
    pub note: Option<String>,
}

/// Classify a case. `<error>` beats `<failure>` beats `<skipped>`.
pub fn classify(case: &Case) -> Classification {
    if let Some(error) = &case.error {
        return Classification {
            status: ExecutionStatus::Error,
            failure: Some(error.into()),
            note: None,
        };
    }

    if let Some(failure) = &case.failure {
        return Classification {
            status: ExecutionStatus::Failed,
            failure: Some(failure.into()),
            note: None,
        };
    }

    if let Some(skipped) = &case.skipped {
        return Classification {
            status: ExecutionStatus::Skipped,
            failure: None,
            note: skipped.message.clone().filter(|m| !m.is_empty()),
        };
    }

    Classification {
        status: ExecutionStatus::Passed,
        failure: None,
        note: None,
    }
}
