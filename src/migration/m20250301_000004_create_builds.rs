//! Migration: Create builds table.
//!
//! One row per import. build_number is a label and is deliberately not unique.

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
                CREATE TABLE builds (
                    id BIGSERIAL PRIMARY KEY,
                    test_suite_id BIGINT NOT NULL REFERENCES test_suites(id) ON DELETE CASCADE,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    build_number TEXT NOT NULL,
                    ci_provider VARCHAR(100) NOT NULL,
                    ci_url TEXT,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    started_at TIMESTAMPTZ,
                    ended_at TIMESTAMPTZ,
                    duration DOUBLE PRECISION,

                    test_case_count BIGINT NOT NULL DEFAULT 0
                );

                CREATE INDEX idx_builds_test_suite_id ON builds(test_suite_id, created_at DESC);
                CREATE INDEX idx_builds_project_id ON builds(project_id);
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
                DROP TABLE IF EXISTS builds CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
