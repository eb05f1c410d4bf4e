//! API endpoint modules.

pub mod builds;
pub mod junit_imports;
pub mod openapi;

pub use builds::configure_routes as configure_build_routes;
pub use junit_imports::configure_routes as configure_junit_import_routes;
pub use openapi::ApiDoc;
