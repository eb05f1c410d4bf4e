//! JUnit import API handler.

use std::sync::Arc;
use std::time::Duration;

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ImportSettings;
use crate::error::{AppError, AppResult};
use crate::junit::{self, ReportImporter};
use crate::models::JunitImportResponse;

/// Multipart part carrying the XML document.
pub const JUNIT_FILE_FIELD: &str = "junitFile";

const DEFAULT_FILE_NAME: &str = "junit.xml";

/// A file read from the multipart body.
struct UploadedFile {
    file_name: String,
    data: Vec<u8>,
}

/// Import a JUnit XML report as a new build of a test suite.
///
/// Responds 201 when every test case was recorded and 200 when the build was
/// committed with per-case problems listed in `processingErrors`.
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/suites/{suite_id}/junit_imports",
    tag = "JUnit",
    params(
        ("project_id" = i64, Path, description = "Project ID"),
        ("suite_id" = i64, Path, description = "Test suite ID")
    ),
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Form with a `junitFile` part holding the JUnit XML document"
    ),
    responses(
        (status = 201, description = "Build created", body = JunitImportResponse),
        (status = 200, description = "Build created with processing errors", body = JunitImportResponse),
        (status = 400, description = "Malformed XML or invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Suite not found in project", body = crate::error::ErrorResponse),
        (status = 413, description = "File too large", body = crate::error::ErrorResponse),
        (status = 415, description = "Body is not multipart/form-data", body = crate::error::ErrorResponse),
        (status = 503, description = "Too many concurrent imports", body = crate::error::ErrorResponse),
        (status = 500, description = "Import failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn import_junit(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    payload: web::Payload,
    importer: web::Data<dyn ReportImporter>,
    settings: web::Data<ImportSettings>,
    import_semaphore: web::Data<Arc<Semaphore>>,
) -> AppResult<HttpResponse> {
    let (project_id, suite_id) = path.into_inner();
    let project_id = parse_id("project ID", &project_id)?;
    let suite_id = parse_id("suite ID", &suite_id)?;

    if !is_multipart(&req) {
        return Err(AppError::UnsupportedMediaType(
            "Request must be multipart/form-data".to_string(),
        ));
    }

    // Bounds memory: max_concurrent_imports x max_upload_size
    let _permit = import_semaphore.try_acquire().map_err(|_| {
        warn!(
            "JUnit import rejected for suite {}: too many concurrent imports",
            suite_id
        );
        AppError::ServiceUnavailable(
            "Too many concurrent imports. Please try again later.".to_string(),
        )
    })?;

    let mut multipart = Multipart::new(req.headers(), payload);
    let file = read_junit_file(&mut multipart, settings.max_upload_size).await?;

    info!(
        "Importing {} ({} bytes) into project {} suite {}",
        file.file_name,
        file.data.len(),
        project_id,
        suite_id
    );

    let UploadedFile { file_name, data } = file;

    // Parse in blocking task
    let report = tokio::task::spawn_blocking(move || junit::decode(&data))
        .await
        .map_err(|e| AppError::Internal(format!("JUnit decode task failed: {}", e)))?
        .map_err(junit::ImportError::from)?;

    let cancel = CancellationToken::new();
    let deadline = (settings.timeout_secs > 0)
        .then(|| spawn_deadline(cancel.clone(), Duration::from_secs(settings.timeout_secs)));

    let result = importer
        .import_report(&cancel, project_id, suite_id, &report)
        .await;

    if let Some(handle) = deadline {
        handle.abort();
    }
    let outcome = result?;

    let processing_errors: Vec<String> = outcome
        .processing_errors
        .iter()
        .map(ToString::to_string)
        .collect();

    let response = JunitImportResponse {
        message: "JUnit XML processed.".to_string(),
        project_id,
        suite_id,
        file_name,
        created_build_id: outcome.build_id,
        processing_errors,
    };

    if response.processing_errors.is_empty() {
        Ok(HttpResponse::Created().json(response))
    } else {
        warn!(
            "Build {} committed with {} processing errors",
            response.created_build_id,
            response.processing_errors.len()
        );
        Ok(HttpResponse::Ok().json(response))
    }
}

fn parse_id(label: &str, raw: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(format!("Invalid {}: {}", label, raw))),
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Read the `junitFile` part, rejecting it once it exceeds `max_size` bytes.
async fn read_junit_file(payload: &mut Multipart, max_size: usize) -> AppResult<UploadedFile> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        if field.name() != Some(JUNIT_FILE_FIELD) {
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            if data.len() + chunk.len() > max_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "{} exceeds the {} byte limit",
                    file_name, max_size
                )));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(UploadedFile { file_name, data });
    }

    Err(AppError::InvalidInput(format!(
        "Missing '{}' file part",
        JUNIT_FILE_FIELD
    )))
}

/// Cancel `token` once `timeout` elapses.
fn spawn_deadline(token: CancellationToken, timeout: Duration) -> tokio::task::JoinHandle<()> {
    actix_web::rt::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!("JUnit import exceeded {:?}, cancelling", timeout);
        token.cancel();
    })
}

/// Configure JUnit import routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/projects/{project_id}/suites/{suite_id}/junit_imports")
            .route(web::post().to(import_junit)),
    );
}
