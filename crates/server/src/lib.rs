//! Directory cache refresh service.
//!
//! This crate provides:
//! - The import job coordinator (single-flight start, background run, finalize)
//! - The ingestion loop that pages through the directory
//! - A watchdog for panicked import tasks
//! - The HTTP read API and Prometheus metrics

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use coordinator::{ImportCoordinator, StartOutcome, recover_orphaned_import_jobs};
pub use error::ApiError;
pub use ingest::{IngestError, IngestSummary, Ingestor, StopReason};
pub use routes::create_router;
pub use state::{AppState, ImportTaskRegistry};
