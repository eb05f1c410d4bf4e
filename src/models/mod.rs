//! API models for builds and test case executions.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub mod build;
pub mod execution;

pub use build::{BuildResponse, JunitImportResponse};
pub use execution::{ExecutionDetail, ExecutionStatus, FailureDetail};

/// Pagination parameters.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    100
}

/// Upper bound for `limit`.
const MAX_LIMIT: u32 = 500;

impl PaginationParams {
    /// Current page, starting at 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Calculate the offset for database queries.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.clamped_limit())
    }

    /// Clamp limit to `1..=MAX_LIMIT`.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, MAX_LIMIT)
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit.max(1))) as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Page of executions for one build.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionListResponse {
    pub executions: Vec<ExecutionDetail>,
    pub pagination: Pagination,
}
