//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Test Results Server",
        version = "0.1.0",
        description = "API server for importing JUnit XML reports and reading back builds and test case executions"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Import endpoints
        api::junit_imports::import_junit,
        // Build endpoints
        api::builds::get_build,
        api::builds::list_build_executions,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::Pagination,
            // Imports
            models::JunitImportResponse,
            // Builds
            models::BuildResponse,
            models::ExecutionStatus,
            models::ExecutionDetail,
            models::FailureDetail,
            models::ExecutionListResponse,
        )
    ),
    tags(
        (name = "JUnit", description = "JUnit XML imports"),
        (name = "Builds", description = "Builds and their test case executions")
    )
)]
pub struct ApiDoc;
