//! Build models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One recorded run of a test suite.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BuildResponse {
    pub id: i64,
    pub test_suite_id: i64,
    pub project_id: i64,
    pub build_number: String,
    pub ci_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Total duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub test_case_count: i64,
}

impl From<crate::entity::build::Model> for BuildResponse {
    fn from(m: crate::entity::build::Model) -> Self {
        BuildResponse {
            id: m.id,
            test_suite_id: m.test_suite_id,
            project_id: m.project_id,
            build_number: m.build_number,
            ci_provider: m.ci_provider,
            ci_url: m.ci_url,
            created_at: m.created_at,
            started_at: m.started_at,
            ended_at: m.ended_at,
            duration: m.duration,
            test_case_count: m.test_case_count,
        }
    }
}

/// Response for a JUnit import.
///
/// Field names follow the uploader contract (`createdBuildId`, `processingErrors`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JunitImportResponse {
    pub message: String,
    pub project_id: i64,
    pub suite_id: i64,
    pub file_name: String,
    pub created_build_id: i64,
    /// Non-fatal problems; the build was still committed.
    pub processing_errors: Vec<String>,
}
