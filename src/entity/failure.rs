//! Failure entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "failures")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub build_test_case_execution_id: i64,
    pub message: Option<String>,
    #[sea_orm(column_name = "type", column_type = "Text", nullable)]
    pub failure_type: Option<String>,
    pub details: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::build_execution::Entity",
        from = "Column::BuildTestCaseExecutionId",
        to = "super::build_execution::Column::Id",
        on_delete = "Cascade"
    )]
    Execution,
}

impl Related<super::build_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Execution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
