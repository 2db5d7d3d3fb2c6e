//! Cache record repository.

use crate::error::MetadataResult;
use crate::models::{CacheRecordRow, RecordMetrics, RecordPage};
use async_trait::async_trait;
use dircache_core::{FranchiseRecord, RecordSort};
use uuid::Uuid;

/// Repository for franchise records.
///
/// Every read method only sees the active generation.
#[async_trait]
pub trait CacheRecordRepo: Send + Sync {
    /// Insert records for a job, inactive.
    ///
    /// Records receive consecutive import indexes starting at `first_index`.
    /// Returns the number of rows written.
    async fn insert_cache_records(
        &self,
        job_id: Uuid,
        first_index: u64,
        records: &[FranchiseRecord],
    ) -> MetadataResult<u64>;

    /// One page of active records. `page` is 1-based; `per_page` is clamped to
    /// `1..=MAX_READ_PAGE_SIZE`.
    async fn list_active_records(
        &self,
        page: u32,
        per_page: u32,
        sort: RecordSort,
    ) -> MetadataResult<RecordPage>;

    /// Case-insensitive substring search over active records.
    ///
    /// Matches name, company, fid, company address and the outlet id, name,
    /// address or maps url values. `limit` is clamped to `1..=MAX_SEARCH_LIMIT`.
    async fn search_active_records(
        &self,
        query: &str,
        sort: RecordSort,
        limit: u32,
    ) -> MetadataResult<Vec<CacheRecordRow>>;

    /// Aggregate counts over active records.
    async fn active_record_metrics(&self) -> MetadataResult<RecordMetrics>;

    /// Count rows (active or not) belonging to a job.
    async fn count_generation_records(&self, job_id: Uuid) -> MetadataResult<u64>;
}

/// Escape `LIKE` wildcards and wrap the lowercased query for substring matching.
///
/// The pattern is meant for `LOWER(column) LIKE ? ESCAPE '\'`.
pub fn search_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Clamp read paging parameters, returning `(limit, offset)`.
pub fn page_bounds(page: u32, per_page: u32) -> (i64, i64) {
    let per_page = per_page.clamp(1, dircache_core::MAX_READ_PAGE_SIZE);
    let page = page.max(1);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (
        i64::from(per_page),
        i64::try_from(offset).unwrap_or(i64::MAX),
    )
}

/// Clamp a search limit.
pub fn search_limit(limit: u32) -> i64 {
    i64::from(limit.clamp(1, dircache_core::MAX_SEARCH_LIMIT))
}
