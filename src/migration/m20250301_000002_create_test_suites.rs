//! Migration: Create test_suites table.
//!
//! Named groupings of test cases, unique per project.

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
                CREATE TABLE test_suites (
                    id BIGSERIAL PRIMARY KEY,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    parent_id BIGINT REFERENCES test_suites(id) ON DELETE CASCADE,

                    -- Cumulative time in seconds
                    time DOUBLE PRECISION NOT NULL DEFAULT 0,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    CONSTRAINT uq_test_suites_project_name UNIQUE (project_id, name)
                );

                CREATE INDEX idx_test_suites_parent_id ON test_suites(parent_id)
                    WHERE parent_id IS NOT NULL;
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
                DROP TABLE IF EXISTS test_suites CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
