//! SeaORM entity definitions for PostgreSQL database.

pub mod build;
pub mod build_execution;
pub mod failure;
pub mod project;
pub mod test_case;
pub mod test_suite;
