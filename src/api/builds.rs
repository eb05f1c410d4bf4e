//! Build API handlers.

use actix_web::{HttpResponse, web};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{BuildResponse, ExecutionListResponse, Pagination, PaginationParams};

/// Get a build by ID.
#[utoipa::path(
    get,
    path = "/api/builds/{build_id}",
    tag = "Builds",
    params(
        ("build_id" = i64, Path, description = "Build ID")
    ),
    responses(
        (status = 200, description = "Build details", body = BuildResponse),
        (status = 404, description = "Build not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_build(pool: web::Data<DbPool>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let build_id = path.into_inner();

    let build = pool
        .get_build(build_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Build {}", build_id)))?;

    Ok(HttpResponse::Ok().json(BuildResponse::from(build)))
}

/// List the executions recorded for a build, in report order.
#[utoipa::path(
    get,
    path = "/api/builds/{build_id}/executions",
    tag = "Builds",
    params(
        ("build_id" = i64, Path, description = "Build ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Executions of the build", body = ExecutionListResponse),
        (status = 404, description = "Build not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_build_executions(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
) -> AppResult<HttpResponse> {
    let build_id = path.into_inner();

    pool.get_build(build_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Build {}", build_id)))?;

    let (executions, total) = pool.list_build_executions(build_id, &query).await?;

    Ok(HttpResponse::Ok().json(ExecutionListResponse {
        executions,
        pagination: Pagination::new(query.page(), query.clamped_limit(), total),
    }))
}

/// Configure build routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/builds/{build_id}").route(web::get().to(get_build)))
        .service(
            web::resource("/builds/{build_id}/executions")
                .route(web::get().to(list_build_executions)),
        );
}
