//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_projects;
mod m20250301_000002_create_test_suites;
mod m20250301_000003_create_test_cases;
mod m20250301_000004_create_builds;
mod m20250301_000005_create_build_test_case_executions;
mod m20250301_000006_create_failures;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_projects::Migration),
            Box::new(m20250301_000002_create_test_suites::Migration),
            Box::new(m20250301_000003_create_test_cases::Migration),
            Box::new(m20250301_000004_create_builds::Migration),
            Box::new(m20250301_000005_create_build_test_case_executions::Migration),
            Box::new(m20250301_000006_create_failures::Migration),
        ]
    }
}
