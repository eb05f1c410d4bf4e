//! Test Results Server library.
//!
//! Ingests JUnit XML reports into builds, executions and failures stored in
//! PostgreSQL, and exposes the HTTP API that serves them.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod junit;
pub mod middleware;
pub mod migration;
pub mod models;
