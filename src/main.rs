//! Test Results Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tokio::sync::Semaphore;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use test_results_lib::api::{self, ApiDoc};
use test_results_lib::config::Config;
use test_results_lib::db::{DbPool, PgIngestRepository};
use test_results_lib::junit::{JunitImporter, ReportImporter};
use test_results_lib::middleware;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and TRS_HOST must be set");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Test Results Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let pool = match DbPool::new(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }
    info!("Database migrations complete");

    // Prepare shared state
    let bind_address = config.bind_address();
    let import_settings = config.import.clone();
    let allowed_origin = config.allowed_origin.clone();
    let is_development = config.is_development();

    let importer: Arc<dyn ReportImporter> =
        Arc::new(JunitImporter::new(PgIngestRepository::new(pool.clone())));

    // Bounds memory: max_concurrent_imports x max_upload_size
    let import_semaphore = Arc::new(Semaphore::new(import_settings.max_concurrent_imports));
    info!(
        "Import limits: {}MB max size, {} concurrent imports, {}s timeout",
        import_settings.max_upload_size / 1024 / 1024,
        import_settings.max_concurrent_imports,
        import_settings.timeout_secs
    );

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);
        if is_development {
            cors = cors
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000");
        }
        if let Some(ref origin) = allowed_origin {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            // CORS must wrap before the logger
            .wrap(cors)
            .wrap(middleware::RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(importer.clone()))
            .app_data(web::Data::new(import_settings.clone()))
            .app_data(web::Data::new(import_semaphore.clone()))
            // Registered before the /api scope, which would otherwise claim /api/docs
            .service(
                SwaggerUi::new("/api/docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .service(
                web::scope("/api")
                    .configure(api::configure_junit_import_routes)
                    .configure(api::configure_build_routes),
            )
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
