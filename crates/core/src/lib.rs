//! Core domain types and shared logic for the directory cache.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Franchise and outlet records as stored in the cache
//! - Import job status and trigger vocabulary
//! - Read-side sort keys
//! - Normalization of loosely-typed upstream payloads
//! - Upstream timestamp parsing and outlet activity
//! - Configuration shared by the server and its collaborators

pub mod config;
pub mod error;
pub mod franchise;
pub mod import;
pub mod normalize;
pub mod timestamp;

pub use error::{Error, Result};
pub use franchise::{FranchiseRecord, OutletRecord};
pub use import::{ImportJobStatus, ImportTrigger, RecordSort};
pub use normalize::{normalize_franchise, normalize_outlet};
pub use timestamp::{outlet_is_active, parse_upstream_timestamp};

/// Default number of franchises requested per upstream page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page a reader may request from the cache.
pub const MAX_READ_PAGE_SIZE: u32 = 200;

/// Largest result set a search may return.
pub const MAX_SEARCH_LIMIT: u32 = 500;
