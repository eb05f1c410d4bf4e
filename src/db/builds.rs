//! Database queries for builds and their executions.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    Statement,
};

use crate::entity::build::{self, Entity as Build};
use crate::entity::build_execution;
use crate::error::{AppError, AppResult};
use crate::models::{ExecutionDetail, ExecutionStatus, FailureDetail, PaginationParams};

use super::DbPool;

#[derive(Debug, FromQueryResult)]
struct ExecutionRow {
    execution_id: i64,
    build_id: i64,
    test_case_id: i64,
    test_case_name: String,
    class_name: String,
    status: String,
    execution_time: f64,
    note: Option<String>,
    created_at: DateTime<Utc>,
    failure_id: Option<i64>,
    failure_message: Option<String>,
    failure_type: Option<String>,
    failure_details: Option<String>,
}

impl ExecutionRow {
    fn into_detail(self) -> AppResult<ExecutionDetail> {
        let status = ExecutionStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!(
                "Unknown status '{}' on execution {}",
                self.status, self.execution_id
            ))
        })?;

        Ok(ExecutionDetail {
            execution_id: self.execution_id,
            build_id: self.build_id,
            test_case_id: self.test_case_id,
            test_case_name: self.test_case_name,
            class_name: self.class_name,
            status,
            execution_time: self.execution_time,
            note: self.note,
            created_at: self.created_at,
            failure: self.failure_id.map(|id| FailureDetail {
                id,
                message: self.failure_message,
                failure_type: self.failure_type,
                details: self.failure_details,
            }),
        })
    }
}

impl DbPool {
    /// Get a build by ID.
    pub async fn get_build(&self, id: i64) -> AppResult<Option<build::Model>> {
        let result = Build::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get build: {}", e)))?;

        Ok(result)
    }

    /// List a build's executions in insertion order, with test case and failure.
    pub async fn list_build_executions(
        &self,
        build_id: i64,
        params: &PaginationParams,
    ) -> AppResult<(Vec<ExecutionDetail>, u64)> {
        let total = build_execution::Entity::find()
            .filter(build_execution::Column::BuildId.eq(build_id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count executions: {}", e)))?;

        let rows = ExecutionRow::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT
                e.id AS execution_id,
                e.build_id,
                e.test_case_id,
                tc.name AS test_case_name,
                tc.classname AS class_name,
                e.status,
                e.execution_time,
                e.note,
                e.created_at,
                f.id AS failure_id,
                f.message AS failure_message,
                f.type AS failure_type,
                f.details AS failure_details
            FROM build_test_case_executions e
            JOIN test_cases tc ON tc.id = e.test_case_id
            LEFT JOIN failures f ON f.build_test_case_execution_id = e.id
            WHERE e.build_id = $1
            ORDER BY e.id
            LIMIT $2 OFFSET $3
            "#,
            vec![
                build_id.into(),
                i64::from(params.clamped_limit()).into(),
                (params.offset() as i64).into(),
            ],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to list executions: {}", e)))?;

        let executions = rows
            .into_iter()
            .map(ExecutionRow::into_detail)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((executions, total))
    }
}
