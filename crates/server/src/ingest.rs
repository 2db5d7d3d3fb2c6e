//! Ingestion loop: pages through the directory and writes one inactive generation.

use crate::metrics;
use dircache_core::config::ImportConfig;
use dircache_core::{FranchiseRecord, normalize_franchise};
use dircache_metadata::{MetadataError, MetadataStore};
use dircache_upstream::{DirectoryApi, FranchisePage};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Why an import run failed. The display text is stored as the job's error message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("directory unavailable: first page returned no rows and no total count")]
    UpstreamUnreachable,

    #[error("cache store error: {0}")]
    Store(#[from] MetadataError),
}

/// Why the loop stopped requesting pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The last page reported by the directory was fetched.
    TotalPagesReached,
    /// Every row of the reported total was seen.
    TotalCountReached,
    /// A page came back with fewer rows than requested.
    ShortPage,
    /// The configured page cap was hit.
    MaxPages,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalPagesReached => "total_pages_reached",
            Self::TotalCountReached => "total_count_reached",
            Self::ShortPage => "short_page",
            Self::MaxPages => "max_pages",
        }
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestSummary {
    pub pages_fetched: u64,
    /// Records written for the job.
    pub processed: u64,
    /// Rows the normalizer could not make sense of.
    pub dropped: u64,
    pub total_count: Option<u64>,
    pub stop_reason: StopReason,
}

/// Running tallies the continuation rules look at.
#[derive(Clone, Copy, Debug, Default)]
struct Progress {
    processed: u64,
    dropped: u64,
    total_count: Option<u64>,
    total_pages: Option<u64>,
}

impl Progress {
    /// Whether the reported totals say rows remain past `page`.
    fn more_pages_reported(&self, page: u32) -> bool {
        self.total_pages.is_some_and(|pages| u64::from(page) < pages)
            || self
                .total_count
                .is_some_and(|total| self.processed + self.dropped < total)
    }
}

/// Decide whether to stop after `page`.
fn stop_after(
    page: u32,
    page_rows: usize,
    unavailable: bool,
    progress: &Progress,
    page_size: u32,
    max_pages: u32,
) -> Option<StopReason> {
    if progress.total_pages.is_some_and(|pages| u64::from(page) >= pages) {
        return Some(StopReason::TotalPagesReached);
    }
    if progress
        .total_count
        .is_some_and(|total| progress.processed + progress.dropped >= total)
    {
        return Some(StopReason::TotalCountReached);
    }
    // A transient failure mid-run is skipped while the directory says more pages exist.
    let skipped = unavailable && page > 1 && progress.more_pages_reported(page);
    if !skipped && page_rows < page_size as usize {
        return Some(StopReason::ShortPage);
    }
    if page >= max_pages {
        return Some(StopReason::MaxPages);
    }
    None
}

/// Pulls every page for one job and stores the normalized rows inactive.
#[derive(Clone)]
pub struct Ingestor {
    directory: Arc<dyn DirectoryApi>,
    metadata: Arc<dyn MetadataStore>,
    config: ImportConfig,
}

impl Ingestor {
    pub fn new(
        directory: Arc<dyn DirectoryApi>,
        metadata: Arc<dyn MetadataStore>,
        config: ImportConfig,
    ) -> Self {
        Self {
            directory,
            metadata,
            config,
        }
    }

    /// Run the loop for `job_id` until a stop rule fires.
    ///
    /// Rows are written tagged with the job and inactive; progress is recorded after
    /// every page. Making the generation visible is left to the caller.
    pub async fn run(&self, job_id: Uuid) -> Result<IngestSummary, IngestError> {
        let page_size = self.config.page_size.max(1);
        let max_pages = self.config.max_pages.max(1);
        let page_delay = self.config.page_delay();

        let mut progress = Progress::default();
        let mut next_index: u64 = 1;
        let mut page: u32 = 1;

        tracing::info!(job_id = %job_id, page_size, max_pages, "Import started");

        loop {
            if page > 1 {
                if let Some(delay) = page_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            let fetched = self.directory.fetch_page(page, page_size).await;
            metrics::IMPORT_PAGES_FETCHED
                .with_label_values(&[fetched.outcome.as_str()])
                .inc();

            if page == 1 && fetched.rows.is_empty() && fetched.total_count.is_none() {
                tracing::warn!(
                    job_id = %job_id,
                    outcome = fetched.outcome.as_str(),
                    "First directory page was empty without a total, failing import"
                );
                return Err(IngestError::UpstreamUnreachable);
            }

            if progress.total_count.is_none() {
                progress.total_count = fetched.total_count;
            }
            if fetched.total_pages.is_some() {
                progress.total_pages = fetched.total_pages;
            }

            let now = OffsetDateTime::now_utc();
            let (records, dropped) = normalize_page(&fetched, now);
            progress.dropped += dropped;
            metrics::IMPORT_RECORDS_DROPPED.inc_by(dropped);

            if !records.is_empty() {
                let written = self
                    .metadata
                    .insert_cache_records(job_id, next_index, &records)
                    .await?;
                next_index += written;
                progress.processed += written;
                metrics::IMPORT_RECORDS_INGESTED.inc_by(written);
            }

            self.metadata
                .update_import_progress(
                    job_id,
                    progress.processed,
                    progress.total_count,
                    u64::from(page),
                    now,
                )
                .await?;

            if fetched.is_unavailable() && page > 1 && progress.more_pages_reported(page) {
                tracing::warn!(
                    job_id = %job_id,
                    page,
                    total_pages = ?progress.total_pages,
                    "Directory page unavailable, skipping"
                );
            } else {
                tracing::debug!(
                    job_id = %job_id,
                    page,
                    rows = fetched.rows.len(),
                    dropped,
                    processed = progress.processed,
                    total_count = ?progress.total_count,
                    "Directory page ingested"
                );
            }

            if let Some(reason) = stop_after(
                page,
                fetched.rows.len(),
                fetched.is_unavailable(),
                &progress,
                page_size,
                max_pages,
            ) {
                if reason == StopReason::MaxPages {
                    tracing::warn!(
                        job_id = %job_id,
                        max_pages,
                        processed = progress.processed,
                        "Import stopped at page cap before the directory was exhausted"
                    );
                }
                tracing::info!(
                    job_id = %job_id,
                    pages = page,
                    processed = progress.processed,
                    dropped = progress.dropped,
                    stop_reason = reason.as_str(),
                    "Import finished fetching"
                );
                return Ok(IngestSummary {
                    pages_fetched: u64::from(page),
                    processed: progress.processed,
                    dropped: progress.dropped,
                    total_count: progress.total_count,
                    stop_reason: reason,
                });
            }

            page += 1;
        }
    }
}

/// Normalize a page, returning the records and the number of rows dropped.
fn normalize_page(page: &FranchisePage, now: OffsetDateTime) -> (Vec<FranchiseRecord>, u64) {
    let records: Vec<FranchiseRecord> = page
        .rows
        .iter()
        .filter_map(|raw| normalize_franchise(raw, now))
        .collect();
    let dropped = (page.rows.len() - records.len()) as u64;
    (records, dropped)
}
