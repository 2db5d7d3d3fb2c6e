//! Client for the remote franchise directory.
//!
//! This crate provides:
//! - The `DirectoryApi` seam the ingestion loop depends on
//! - A bearer token cache with injectable clock and authenticator
//! - An HTTP implementation that retries once on authorization rejection
//! - Extraction of rows and totals from the directory's varying response shapes
//!
//! Public operations never fail: an unreachable directory shows up as an
//! unavailable page or a `None` lookup, which callers are expected to handle.

pub mod client;
pub mod error;
pub mod payload;
pub mod token;

pub use client::DirectoryClient;
pub use error::{UpstreamError, UpstreamResult};
pub use token::{AuthToken, Authenticator, Clock, HttpAuthenticator, SystemClock, TokenCache};

use async_trait::async_trait;
use dircache_core::config::DirectoryConfig;
use serde_json::Value;
use std::sync::Arc;

/// Whether a page request reached the directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// The directory answered with a list response (possibly empty).
    Fetched,
    /// Transport failure, timeout, non-success status or no token.
    Unavailable,
}

impl PageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Unavailable => "unavailable",
        }
    }
}

/// One page of raw franchise rows.
#[derive(Clone, Debug, PartialEq)]
pub struct FranchisePage {
    pub rows: Vec<Value>,
    pub total_count: Option<u64>,
    pub total_pages: Option<u64>,
    pub outcome: PageOutcome,
}

impl FranchisePage {
    /// The empty page reported when the directory could not be reached.
    pub fn unavailable() -> Self {
        Self {
            rows: Vec::new(),
            total_count: None,
            total_pages: None,
            outcome: PageOutcome::Unavailable,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.outcome == PageOutcome::Unavailable
    }
}

/// Result of a single outlet lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutletLookup {
    pub franchise_name: Option<String>,
    pub outlet_name: Option<String>,
    /// `false` when the directory reported the outlet does not exist.
    pub found: bool,
}

impl OutletLookup {
    pub fn not_found() -> Self {
        Self {
            franchise_name: None,
            outlet_name: None,
            found: false,
        }
    }
}

/// Operations consumed from the remote directory.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Fetch one page of franchises. `page` is 1-based.
    async fn fetch_page(&self, page: u32, page_size: u32) -> FranchisePage;

    /// Look up one outlet of one franchise.
    ///
    /// `Some` with `found == false` when the directory says it does not exist;
    /// `None` when the directory could not be asked.
    async fn fetch_outlet(&self, fid: &str, oid: &str) -> Option<OutletLookup>;
}

/// Create a directory client from configuration.
pub fn from_config(config: &DirectoryConfig) -> UpstreamResult<Arc<dyn DirectoryApi>> {
    config.validate().map_err(UpstreamError::Config)?;
    if !config.has_credentials() {
        tracing::warn!(
            "No directory credentials configured; every refresh will fail until they are set"
        );
    }
    Ok(Arc::new(DirectoryClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_rejects_invalid_base_url() {
        let config = DirectoryConfig::new("not a url");
        assert!(matches!(from_config(&config), Err(UpstreamError::Config(_))));
    }

    #[test]
    fn unavailable_page_is_empty() {
        let page = FranchisePage::unavailable();
        assert!(page.is_unavailable());
        assert!(page.rows.is_empty());
        assert_eq!(page.total_count, None);
    }
}
