//! JUnit ingestion pipeline.
//!
//! `decoder` turns bytes into a [`Report`], `coordinator` persists it through
//! the storage contract in `port`, using `resolver` for find-or-create and
//! `classifier` for per-case status.

pub mod classifier;
pub mod coordinator;
pub mod decoder;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod port;
pub mod report;
pub mod resolver;

pub use classifier::{Classification, FailurePayload, classify};
pub use coordinator::{ImportOutcome, JUNIT_CI_PROVIDER, JunitImporter, ReportImporter};
pub use decoder::decode;
pub use error::{DecodeError, ImportError, ProcessingError, StoreError};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{FaultPlan, MemoryRepository};
pub use port::{IngestRepository, IngestTx};
pub use report::{Case, Fault, Report, Skip, Suite};
pub use resolver::EntityResolver;
