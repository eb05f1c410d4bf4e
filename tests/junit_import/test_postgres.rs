//! PostgreSQL-backed import tests.
//!
//! Requires a running PostgreSQL database reachable through DATABASE_URL.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use actix_web::{App, test, web};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use serde_json::Value;
use test_results_lib::config::DatabaseSettings;
use test_results_lib::db::{DbPool, PgIngestRepository};
use test_results_lib::junit::{ImportError, JunitImporter, ProcessingError, ReportImporter, decode};
use tokio::sync::{OnceCell, Semaphore};
use tokio_util::sync::CancellationToken;

use super::test_helpers::*;

static MIGRATIONS_RUN: OnceCell<()> = OnceCell::const_new();
static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Create a fresh DB pool. Migrations run only once.
async fn create_test_pool() -> DbPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a PostgreSQL database for these tests");
    let pool = DbPool::new(&DatabaseSettings {
        url,
        max_connections: 4,
        min_connections: 1,
    })
    .await
    .expect("Failed to connect to database");

    MIGRATIONS_RUN
        .get_or_init(|| async {
            pool.run_migrations()
                .await
                .expect("Failed to run migrations");
        })
        .await;

    pool
}

/// Unique name for test isolation.
fn unique_name(prefix: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        prefix,
        std::process::id(),
        chrono::Utc::now().timestamp_micros(),
        NAME_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

async fn insert_returning_id(pool: &DbPool, sql: &str, values: Vec<sea_orm::Value>) -> i64 {
    pool.connection()
        .query_one_raw(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            sql,
            values,
        ))
        .await
        .expect("insert failed")
        .expect("insert returned no row")
        .try_get::<i64>("", "id")
        .expect("id column")
}

/// Seed a project with one suite.
async fn seed_suite(pool: &DbPool) -> (i64, i64) {
    let project_id = insert_returning_id(
        pool,
        "INSERT INTO projects (name) VALUES ($1) RETURNING id",
        vec![unique_name("project").into()],
    )
    .await;
    let suite_id = insert_returning_id(
        pool,
        "INSERT INTO test_suites (project_id, name) VALUES ($1, $2) RETURNING id",
        vec![project_id.into(), "S".into()],
    )
    .await;
    (project_id, suite_id)
}

async fn count(pool: &DbPool, sql: &str, id: i64) -> i64 {
    pool.connection()
        .query_one_raw(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            sql,
            vec![id.into()],
        ))
        .await
        .expect("count failed")
        .expect("count returned no row")
        .try_get::<i64>("", "n")
        .expect("n column")
}

async fn builds_of_suite(pool: &DbPool, suite_id: i64) -> i64 {
    count(
        pool,
        "SELECT COUNT(*) AS n FROM builds WHERE test_suite_id = $1",
        suite_id,
    )
    .await
}

#[actix_rt::test]
#[ignore]
async fn test_postgres_import_and_read_back() {
    let pool = create_test_pool().await;
    let (project_id, suite_id) = seed_suite(&pool).await;
    let importer: Arc<dyn ReportImporter> =
        Arc::new(JunitImporter::new(PgIngestRepository::new(pool.clone())));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(importer))
            .app_data(web::Data::new(test_settings()))
            .app_data(web::Data::new(Arc::new(Semaphore::new(2))))
            .service(
                web::scope("/api")
                    .configure(test_results_lib::api::configure_junit_import_routes)
                    .configure(test_results_lib::api::configure_build_routes),
            ),
    )
    .await;

    let (status, body) = upload_junit(&app, project_id, suite_id, HAPPY_PATH_XML).await;
    assert_eq!(status, 201, "Import should succeed: {:?}", body);
    let build_id = body["createdBuildId"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/builds/{}", build_id))
        .to_request();
    let build: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(build["test_case_count"], 2);
    assert_eq!(build["build_number"], "S");
    assert_eq!(build["ci_provider"], "JUnit Import");

    let req = test::TestRequest::get()
        .uri(&format!("/api/builds/{}/executions", build_id))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    let executions = listing["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0]["test_case_name"], "t1");
    assert_eq!(executions[0]["status"], "passed");
    assert!(executions[0]["failure"].is_null());
    assert_eq!(executions[1]["status"], "failed");
    assert_eq!(executions[1]["failure"]["message"], "m");
    assert_eq!(executions[1]["failure"]["type"], "AssertionError");
    assert_eq!(executions[1]["failure"]["details"], "d");
    assert_eq!(listing["pagination"]["total"], 2);

    let req = test::TestRequest::get()
        .uri("/api/builds/999999999/executions")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
#[ignore]
async fn test_postgres_reimport_reuses_test_cases() {
    let pool = create_test_pool().await;
    let (project_id, suite_id) = seed_suite(&pool).await;
    let importer = JunitImporter::new(PgIngestRepository::new(pool.clone()));
    let report = decode(HAPPY_PATH_XML.as_bytes()).unwrap();
    let cancel = CancellationToken::new();

    let first = importer
        .process_report(&cancel, project_id, suite_id, &report)
        .await
        .unwrap();
    let second = importer
        .process_report(&cancel, project_id, suite_id, &report)
        .await
        .unwrap();

    assert_ne!(first.build_id, second.build_id);
    assert_eq!(builds_of_suite(&pool, suite_id).await, 2);
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) AS n FROM test_cases WHERE suite_id = $1",
            suite_id
        )
        .await,
        2
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_classname_mismatch_is_not_fatal() {
    let pool = create_test_pool().await;
    let (project_id, suite_id) = seed_suite(&pool).await;
    insert_returning_id(
        &pool,
        "INSERT INTO test_cases (suite_id, name, classname) VALUES ($1, $2, $3) RETURNING id",
        vec![suite_id.into(), "t1".into(), "Other".into()],
    )
    .await;
    let importer = JunitImporter::new(PgIngestRepository::new(pool.clone()));
    let report = decode(HAPPY_PATH_XML.as_bytes()).unwrap();

    let outcome = importer
        .process_report(&CancellationToken::new(), project_id, suite_id, &report)
        .await
        .unwrap();

    assert_eq!(outcome.processing_errors.len(), 1);
    assert!(matches!(
        &outcome.processing_errors[0],
        ProcessingError::ClassNameMismatch { name, .. } if name == "t1"
    ));
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) AS n FROM build_test_case_executions WHERE build_id = $1",
            outcome.build_id
        )
        .await,
        2
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_suite_not_in_project() {
    let pool = create_test_pool().await;
    let (_, suite_id) = seed_suite(&pool).await;
    let (other_project, _) = seed_suite(&pool).await;
    let importer = JunitImporter::new(PgIngestRepository::new(pool.clone()));
    let report = decode(HAPPY_PATH_XML.as_bytes()).unwrap();

    let result = importer
        .process_report(&CancellationToken::new(), other_project, suite_id, &report)
        .await;

    assert!(matches!(result, Err(ImportError::SuiteNotInProject { .. })));
    assert_eq!(builds_of_suite(&pool, suite_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_postgres_cancelled_import_rolls_back() {
    let pool = create_test_pool().await;
    let (project_id, suite_id) = seed_suite(&pool).await;
    let importer = JunitImporter::new(PgIngestRepository::new(pool.clone()));
    let report = decode(HAPPY_PATH_XML.as_bytes()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = importer
        .process_report(&cancel, project_id, suite_id, &report)
        .await;

    assert!(matches!(result, Err(ImportError::Canceled)));
    assert_eq!(builds_of_suite(&pool, suite_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_postgres_long_build_label_and_failure_type() {
    let pool = create_test_pool().await;
    let (project_id, suite_id) = seed_suite(&pool).await;
    let importer = JunitImporter::new(PgIngestRepository::new(pool.clone()));
    let label = "n".repeat(300);
    let failure_type = "T".repeat(300);
    let xml = format!(
        r#"<testsuites name="{}"><testsuite name="S"><testcase name="t1" classname="C"/><testcase name="t2" classname="C"><failure message="m" type="{}">d</failure></testcase></testsuite></testsuites>"#,
        label, failure_type
    );
    let report = decode(xml.as_bytes()).unwrap();

    let outcome = importer
        .process_report(&CancellationToken::new(), project_id, suite_id, &report)
        .await
        .unwrap();

    assert!(
        outcome.processing_errors.is_empty(),
        "unexpected errors: {:?}",
        outcome.processing_errors
    );
    let build = pool.get_build(outcome.build_id).await.unwrap().unwrap();
    assert_eq!(build.build_number, label);
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) AS n FROM failures f JOIN build_test_case_executions e ON e.id = f.build_test_case_execution_id WHERE e.build_id = $1 AND length(f.type) = 300",
            outcome.build_id
        )
        .await,
        1
    );
}
