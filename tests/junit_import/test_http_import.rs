//! HTTP scenarios for POST /api/projects/{project_id}/suites/{suite_id}/junit_imports.

use actix_web::test;
use test_results_lib::junit::{FaultPlan, ImportError, JunitImporter, decode};
use test_results_lib::models::ExecutionStatus;
use tokio_util::sync::CancellationToken;

use super::test_helpers::*;

/// Happy path: two cases, one failing.
#[actix_rt::test]
async fn test_happy_path_creates_build() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, HAPPY_PATH_XML).await;

    assert_eq!(status, 201, "Import should succeed: {:?}", body);
    assert_eq!(body["message"], "JUnit XML processed.");
    assert_eq!(body["projectId"], seeded.project_id);
    assert_eq!(body["suiteId"], seeded.suite_id);
    assert_eq!(body["fileName"], "junit.xml");
    assert_eq!(body["processingErrors"].as_array().unwrap().len(), 0);

    let build_id = body["createdBuildId"].as_i64().unwrap();
    let state = seeded.repo.snapshot().await;
    assert_eq!(state.builds.len(), 1);
    let build = state.build(build_id).unwrap();
    assert_eq!(build.test_case_count, 2);
    assert_eq!(build.build_number, "S");
    assert_eq!(build.ci_provider, "JUnit Import");

    let executions = state.executions_of(build_id);
    let statuses: Vec<_> = executions.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![ExecutionStatus::Passed, ExecutionStatus::Failed]);

    assert_eq!(state.failures.len(), 1);
    let failure = state.failure_of(executions[1].id).unwrap();
    assert_eq!(failure.message.as_deref(), Some("m"));
    assert_eq!(failure.failure_type.as_deref(), Some("AssertionError"));
    assert_eq!(failure.details.as_deref(), Some("d"));
}

/// A bare `<testsuite>` root names the build after the suite.
#[actix_rt::test]
async fn test_bare_testsuite_root() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let xml = r#"<testsuite name="only"><testcase name="t" classname="C" time="0"/></testsuite>"#;
    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, xml).await;

    assert_eq!(status, 201, "Import should succeed: {:?}", body);
    let build_id = body["createdBuildId"].as_i64().unwrap();
    let state = seeded.repo.snapshot().await;
    assert_eq!(state.build(build_id).unwrap().build_number, "only");

    let executions = state.executions_of(build_id);
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Passed);
}

/// Malformed XML is rejected before anything is stored.
#[actix_rt::test]
async fn test_malformed_xml_rejected() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, "<<<not xml").await;

    assert_eq!(status, 400, "Malformed XML should be rejected: {:?}", body);
    assert_eq!(body["error"], "INVALID_INPUT");
    assert!(body["message"].as_str().unwrap().contains("Invalid XML"));
    assert!(seeded.repo.snapshot().await.builds.is_empty());
}

/// A suite owned by another project is reported as not found.
#[actix_rt::test]
async fn test_suite_not_in_project() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let other_project = seeded.repo.add_project("other").await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let (status, body) = upload_junit(&app, other_project, seeded.suite_id, HAPPY_PATH_XML).await;

    assert_eq!(status, 404, "Foreign suite should be rejected: {:?}", body);
    assert_eq!(body["error"], "NOT_FOUND");

    let state = seeded.repo.snapshot().await;
    assert!(state.builds.is_empty());
    assert!(state.test_cases.is_empty());
}

/// A classname collision is reported but the build still commits.
#[actix_rt::test]
async fn test_partial_failure_reports_classname_mismatch() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    seeded.repo.add_test_case(seeded.suite_id, "t1", "Other").await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let xml = r#"<testsuite name="S"><testcase name="t1" classname="C" time="0.1"/><testcase name="t2" classname="C" time="0.2"/></testsuite>"#;
    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, xml).await;

    assert_eq!(status, 200, "Import should commit with errors: {:?}", body);
    let errors = body["processingErrors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    let message = errors[0].as_str().unwrap();
    assert!(message.contains("'t1'"), "unexpected error: {}", message);
    assert!(message.contains("'Other'"), "unexpected error: {}", message);

    let build_id = body["createdBuildId"].as_i64().unwrap();
    let state = seeded.repo.snapshot().await;
    assert_eq!(state.builds.len(), 1);
    assert_eq!(state.executions_of(build_id).len(), 2);
    assert_eq!(state.build(build_id).unwrap().test_case_count, 2);
    // The stored classname is left alone
    let t1 = state.test_cases.iter().find(|tc| tc.name == "t1").unwrap();
    assert_eq!(t1.classname, "Other");
}

/// Cancellation after the build insert rolls everything back.
#[tokio::test]
async fn test_cancellation_after_build_insert() {
    let cancel = CancellationToken::new();
    let seeded = seeded_repository(FaultPlan {
        cancel_after_build_insert: Some(cancel.clone()),
        ..Default::default()
    })
    .await;
    let importer = JunitImporter::new(seeded.repo.clone());
    let report = decode(HAPPY_PATH_XML.as_bytes()).unwrap();

    let result = importer
        .process_report(&cancel, seeded.project_id, seeded.suite_id, &report)
        .await;

    assert!(matches!(result, Err(ImportError::Canceled)), "got {:?}", result);
    let state = seeded.repo.snapshot().await;
    assert!(state.builds.is_empty());
    assert!(state.executions.is_empty());
    assert!(state.test_cases.is_empty());
}

/// Large reports are decoded on the blocking pool and imported in full.
#[actix_rt::test]
async fn test_large_report_imported() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let cases: String = (0..500)
        .map(|i| format!(r#"<testcase name="case_{}" classname="C" time="0.01"/>"#, i))
        .collect();
    let xml = format!(r#"<testsuite name="bulk">{}</testsuite>"#, cases);
    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, &xml).await;

    assert_eq!(status, 201, "Import should succeed: {:?}", body);
    let build_id = body["createdBuildId"].as_i64().unwrap();
    let state = seeded.repo.snapshot().await;
    assert_eq!(state.executions_of(build_id).len(), 500);
    assert_eq!(state.build(build_id).unwrap().test_case_count, 500);
}

#[actix_rt::test]
async fn test_non_multipart_body_rejected() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let req = test::TestRequest::post()
        .uri(&import_uri(seeded.project_id, seeded.suite_id))
        .insert_header(("Content-Type", "application/xml"))
        .set_payload(HAPPY_PATH_XML)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 415);
    assert!(seeded.repo.snapshot().await.builds.is_empty());
}

#[actix_rt::test]
async fn test_oversized_file_rejected() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let mut settings = test_settings();
    settings.max_upload_size = 64;
    let app = create_test_app(seeded.repo.clone(), settings).await;

    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, HAPPY_PATH_XML).await;

    assert_eq!(status, 413, "Oversized file should be rejected: {:?}", body);
    assert!(seeded.repo.snapshot().await.builds.is_empty());
}

#[actix_rt::test]
async fn test_missing_file_part_rejected() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let req = test::TestRequest::post()
        .uri(&import_uri(seeded.project_id, seeded.suite_id))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body("report", "junit.xml", HAPPY_PATH_XML))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_rt::test]
async fn test_import_capacity_exhausted() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let mut settings = test_settings();
    settings.max_concurrent_imports = 0;
    let app = create_test_app(seeded.repo.clone(), settings).await;

    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, HAPPY_PATH_XML).await;

    assert_eq!(status, 503, "Import should be refused: {:?}", body);
    assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
}

#[actix_rt::test]
async fn test_invalid_path_ids_rejected() {
    let seeded = seeded_repository(FaultPlan::default()).await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let (status, _) = upload_junit(&app, 0, seeded.suite_id, HAPPY_PATH_XML).await;
    assert_eq!(status, 400);

    let req = test::TestRequest::post()
        .uri("/api/projects/abc/suites/1/junit_imports")
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body("junitFile", "junit.xml", HAPPY_PATH_XML))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_rt::test]
async fn test_store_failure_maps_to_500() {
    let seeded = seeded_repository(FaultPlan {
        fail_commit: true,
        ..Default::default()
    })
    .await;
    let app = create_test_app(seeded.repo.clone(), test_settings()).await;

    let (status, body) = upload_junit(&app, seeded.project_id, seeded.suite_id, HAPPY_PATH_XML).await;

    assert_eq!(status, 500, "Commit failure should be fatal: {:?}", body);
    assert!(seeded.repo.snapshot().await.builds.is_empty());
}
