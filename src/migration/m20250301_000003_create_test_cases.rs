//! Migration: Create test_cases table.
//!
//! Test cases are created on demand by imports. The (suite_id, name)
//! constraint backs concurrent find-or-create.

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
                CREATE TABLE test_cases (
                    id BIGSERIAL PRIMARY KEY,
                    suite_id BIGINT NOT NULL REFERENCES test_suites(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    classname TEXT NOT NULL DEFAULT '',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    CONSTRAINT uq_test_cases_suite_name UNIQUE (suite_id, name)
                );
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
                DROP TABLE IF EXISTS test_cases CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
