//! Migration: Create build_test_case_executions table.
//!
//! Result of one test case within one build.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE build_test_case_executions (
                    id BIGSERIAL PRIMARY KEY,
                    build_id BIGINT NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
                    test_case_id BIGINT NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,

                    status VARCHAR(20) NOT NULL
                        CHECK (status IN ('passed', 'failed', 'error', 'skipped')),

                    -- Seconds
                    execution_time DOUBLE PRECISION NOT NULL DEFAULT 0,

                    -- Skip reason
                    note TEXT,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Executions are read back per build in insertion order
                CREATE INDEX idx_executions_build_id ON build_test_case_executions(build_id, id);
                CREATE INDEX idx_executions_test_case_id ON build_test_case_executions(test_case_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS build_test_case_executions CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
