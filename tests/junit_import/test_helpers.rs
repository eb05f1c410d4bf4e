//! Shared test helpers for JUnit import tests.

use std::sync::Arc;

use actix_web::{App, dev::ServiceResponse, test, web};
use serde_json::Value;
use tokio::sync::Semaphore;
use test_results_lib::config::ImportSettings;
use test_results_lib::junit::{FaultPlan, JunitImporter, MemoryRepository, ReportImporter};

pub const BOUNDARY: &str = "----junit-import-test-boundary";

/// Report from the happy-path scenario: one passing and one failing case.
pub const HAPPY_PATH_XML: &str = r#"<testsuites><testsuite name="S"><testcase name="t1" classname="C" time="0.1"/><testcase name="t2" classname="C" time="0.2"><failure message="m" type="AssertionError">d</failure></testcase></testsuite></testsuites>"#;

/// A repository seeded with one project and one suite.
pub struct Seeded {
    pub repo: MemoryRepository,
    pub project_id: i64,
    pub suite_id: i64,
}

pub async fn seeded_repository(faults: FaultPlan) -> Seeded {
    let repo = MemoryRepository::new().with_faults(faults);
    let project_id = repo.add_project("project").await;
    let suite_id = repo.add_suite(project_id, "S").await;
    Seeded {
        repo,
        project_id,
        suite_id,
    }
}

pub fn test_settings() -> ImportSettings {
    ImportSettings {
        max_upload_size: 64 * 1024,
        max_concurrent_imports: 2,
        timeout_secs: 30,
    }
}

/// Create a test app mounting the import route over `repo`.
pub async fn create_test_app(
    repo: MemoryRepository,
    settings: ImportSettings,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let permits = settings.max_concurrent_imports;
    let importer: Arc<dyn ReportImporter> = Arc::new(JunitImporter::new(repo));

    test::init_service(
        App::new()
            .app_data(web::Data::from(importer))
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(Arc::new(Semaphore::new(permits))))
            .service(
                web::scope("/api").configure(test_results_lib::api::configure_junit_import_routes),
            ),
    )
    .await
}

/// Encode `xml` as a multipart body with a single part named `field`.
pub fn multipart_body(field: &str, file_name: &str, xml: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/xml\r\n\r\n{xml}\r\n--{b}--\r\n",
        b = BOUNDARY
    )
    .into_bytes()
}

pub fn import_uri(project_id: i64, suite_id: i64) -> String {
    format!(
        "/api/projects/{}/suites/{}/junit_imports",
        project_id, suite_id
    )
}

/// POST `xml` as the `junitFile` part.
pub async fn upload_junit<S>(app: &S, project_id: i64, suite_id: i64, xml: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri(&import_uri(project_id, suite_id))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body("junitFile", "junit.xml", xml))
        .to_request();

    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}
