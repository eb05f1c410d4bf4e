//! BuildTestCaseExecution entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "build_test_case_executions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub build_id: i64,
    pub test_case_id: i64,
    /// passed, failed, error or skipped
    pub status: String,
    /// Seconds.
    pub execution_time: f64,
    /// Skip reason reported by the runner.
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::build::Entity",
        from = "Column::BuildId",
        to = "super::build::Column::Id",
        on_delete = "Cascade"
    )]
    Build,
    #[sea_orm(
        belongs_to = "super::test_case::Entity",
        from = "Column::TestCaseId",
        to = "super::test_case::Column::Id",
        on_delete = "Cascade"
    )]
    TestCase,
    #[sea_orm(has_one = "super::failure::Entity")]
    Failure,
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Build.def()
    }
}

impl Related<super::test_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestCase.def()
    }
}

impl Related<super::failure::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Failure.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
