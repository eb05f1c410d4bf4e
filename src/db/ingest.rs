//! PostgreSQL implementation of the JUnit ingest repository.
//!
//! Each import runs on one `DatabaseTransaction`. Writes that may be rejected
//! row by row (test cases, executions, failures) run inside a savepoint so a
//! constraint violation does not abort the surrounding transaction.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseTransaction, DbErr,
    EntityTrait, NotSet, QueryFilter, Set, SqlErr, Statement, TransactionTrait,
};

use super::DbPool;
use crate::entity::{build, build_execution, failure, test_case, test_suite};
use crate::junit::StoreError;
use crate::junit::port::{
    BatchResult, IngestRepository, IngestTx, NewBuild, NewExecution, NewFailure, SuiteRef,
    TestCaseRef,
};

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => StoreError::UniqueViolation(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                StoreError::ForeignKeyViolation(msg)
            }
            _ => match err {
                DbErr::RecordNotFound(_) => StoreError::NotFound,
                other => StoreError::Database(other.to_string()),
            },
        }
    }
}

/// Ingest repository backed by the shared connection pool.
#[derive(Clone)]
pub struct PgIngestRepository {
    pool: DbPool,
}

impl PgIngestRepository {
    pub fn new(pool: DbPool) -> Self {
        PgIngestRepository { pool }
    }
}

#[async_trait]
impl IngestRepository for PgIngestRepository {
    type Tx = PgIngestTx;

    async fn begin(&self) -> Result<PgIngestTx, StoreError> {
        let txn = self.pool.connection().begin().await?;
        Ok(PgIngestTx { txn })
    }
}

/// An open import transaction.
pub struct PgIngestTx {
    txn: DatabaseTransaction,
}

impl PgIngestTx {
    async fn insert_execution(&self, row: &NewExecution) -> Result<i64, StoreError> {
        let savepoint = self.txn.begin().await?;
        let model = build_execution::ActiveModel {
            id: NotSet,
            build_id: Set(row.build_id),
            test_case_id: Set(row.test_case_id),
            status: Set(row.status.as_str().to_string()),
            execution_time: Set(row.execution_time),
            note: Set(row.note.clone()),
            created_at: NotSet,
        };

        match model.insert(&savepoint).await {
            Ok(inserted) => {
                savepoint.commit().await?;
                Ok(inserted.id)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn insert_failure(&self, row: &NewFailure) -> Result<i64, StoreError> {
        let savepoint = self.txn.begin().await?;
        let model = failure::ActiveModel {
            id: NotSet,
            build_test_case_execution_id: Set(row.execution_id),
            message: Set(row.message.clone()),
            failure_type: Set(row.failure_type.clone()),
            details: Set(row.details.clone()),
        };

        match model.insert(&savepoint).await {
            Ok(inserted) => {
                savepoint.commit().await?;
                Ok(inserted.id)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl IngestTx for PgIngestTx {
    async fn lookup_suite(&mut self, suite_id: i64) -> Result<Option<SuiteRef>, StoreError> {
        let suite = test_suite::Entity::find_by_id(suite_id)
            .one(&self.txn)
            .await?;

        Ok(suite.map(|s| SuiteRef {
            id: s.id,
            project_id: s.project_id,
            name: s.name,
        }))
    }

    async fn get_test_case_by_suite_and_name(
        &mut self,
        suite_id: i64,
        name: &str,
    ) -> Result<Option<TestCaseRef>, StoreError> {
        let found = test_case::Entity::find()
            .filter(test_case::Column::SuiteId.eq(suite_id))
            .filter(test_case::Column::Name.eq(name))
            .one(&self.txn)
            .await?;

        Ok(found.map(|tc| TestCaseRef {
            id: tc.id,
            suite_id: tc.suite_id,
            name: tc.name,
            classname: tc.classname,
        }))
    }

    async fn insert_test_case(
        &mut self,
        suite_id: i64,
        name: &str,
        classname: &str,
    ) -> Result<i64, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            INSERT INTO test_cases (suite_id, name, classname)
            VALUES ($1, $2, $3)
            ON CONFLICT (suite_id, name) DO NOTHING
            RETURNING id
            "#,
            vec![suite_id.into(), name.into(), classname.into()],
        );

        let savepoint = self.txn.begin().await?;
        let row = match savepoint.query_one_raw(stmt).await {
            Ok(row) => row,
            Err(e) => {
                savepoint.rollback().await?;
                return Err(e.into());
            }
        };
        savepoint.commit().await?;

        match row {
            Some(row) => Ok(row.try_get::<i64>("", "id")?),
            // The conflicting row belongs to a concurrent import.
            None => Err(StoreError::UniqueViolation(format!(
                "test case '{}' already exists in suite {}",
                name, suite_id
            ))),
        }
    }

    async fn insert_build(&mut self, new_build: &NewBuild) -> Result<i64, StoreError> {
        let model = build::ActiveModel {
            id: NotSet,
            test_suite_id: Set(new_build.test_suite_id),
            project_id: Set(new_build.project_id),
            build_number: Set(new_build.build_number.clone()),
            ci_provider: Set(new_build.ci_provider.clone()),
            ci_url: Set(new_build.ci_url.clone()),
            created_at: NotSet,
            started_at: Set(new_build.started_at),
            ended_at: Set(new_build.ended_at),
            duration: Set(new_build.duration),
            test_case_count: Set(0),
        };

        let inserted = model.insert(&self.txn).await?;
        Ok(inserted.id)
    }

    async fn update_build_test_case_count(
        &mut self,
        build_id: i64,
        count: i64,
    ) -> Result<(), StoreError> {
        let result = build::Entity::update_many()
            .col_expr(build::Column::TestCaseCount, Expr::value(count))
            .filter(build::Column::Id.eq(build_id))
            .exec(&self.txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_executions(
        &mut self,
        rows: &[NewExecution],
    ) -> Result<BatchResult, StoreError> {
        let mut results = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            results.push((index, self.insert_execution(row).await));
        }
        Ok(results)
    }

    async fn insert_failures(&mut self, rows: &[NewFailure]) -> Result<BatchResult, StoreError> {
        let mut results = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            results.push((index, self.insert_failure(row).await));
        }
        Ok(results)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback().await?;
        Ok(())
    }
}
