//! Migration: Create failures table.
//!
//! At most one failure per execution.

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
                CREATE TABLE failures (
                    id BIGSERIAL PRIMARY KEY,
                    build_test_case_execution_id BIGINT NOT NULL UNIQUE
                        REFERENCES build_test_case_executions(id) ON DELETE CASCADE,
                    message TEXT,
                    type TEXT,
                    details TEXT
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
                DROP TABLE IF EXISTS failures CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
