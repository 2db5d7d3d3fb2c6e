//! Database models mapping to the cache schema.

use crate::error::MetadataResult;
use dircache_core::{FranchiseRecord, ImportJobStatus, ImportTrigger, OutletRecord};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Import jobs
// =============================================================================

/// One refresh run.
#[derive(Debug, Clone, FromRow)]
pub struct ImportJobRow {
    pub job_id: Uuid,
    /// `running`, `completed` or `failed`.
    pub status: String,
    /// `cron` or `manual`.
    pub trigger_source: String,
    pub requested_by: Option<String>,
    /// Records persisted for this job so far. Never decreases.
    pub processed_count: i64,
    /// Set once from the first page reporting a total, or back-filled at completion.
    pub total_count: Option<i64>,
    pub pages_fetched: i64,
    pub error_message: Option<String>,
    pub started_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl ImportJobRow {
    /// A fresh `running` job.
    pub fn new_running(
        trigger: ImportTrigger,
        requested_by: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: ImportJobStatus::Running.as_str().to_string(),
            trigger_source: trigger.as_str().to_string(),
            requested_by,
            processed_count: 0,
            total_count: None,
            pages_fetched: 0,
            error_message: None,
            started_at: now,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn status(&self) -> dircache_core::Result<ImportJobStatus> {
        ImportJobStatus::parse(&self.status)
    }

    pub fn trigger(&self) -> dircache_core::Result<ImportTrigger> {
        ImportTrigger::parse(&self.trigger_source)
    }

    pub fn is_running(&self) -> bool {
        self.status == ImportJobStatus::Running.as_str()
    }
}

// =============================================================================
// Cache records
// =============================================================================

/// One normalized franchise belonging to a generation.
#[derive(Debug, Clone, FromRow)]
pub struct CacheRecordRow {
    pub record_id: i64,
    pub job_id: Uuid,
    /// Position within the generation, 1-based and contiguous across pages.
    pub import_index: i64,
    pub fid: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub company_address: Option<String>,
    /// Upstream-reported timestamp string.
    pub created_at: Option<String>,
    /// Upstream-reported timestamp string.
    pub updated_at: Option<String>,
    /// Serialized `Vec<OutletRecord>`.
    pub outlets_json: String,
    pub outlet_count: i64,
    pub active_outlet_count: i64,
    /// Only active rows are visible to readers.
    pub is_active: bool,
    pub inserted_at: OffsetDateTime,
}

impl CacheRecordRow {
    pub fn outlets(&self) -> MetadataResult<Vec<OutletRecord>> {
        Ok(serde_json::from_str(&self.outlets_json)?)
    }

    /// Rebuild the canonical record.
    pub fn to_franchise(&self) -> MetadataResult<FranchiseRecord> {
        Ok(FranchiseRecord {
            fid: self.fid.clone(),
            name: self.name.clone(),
            company: self.company.clone(),
            company_address: self.company_address.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            outlets: self.outlets()?,
        })
    }
}

/// One page of the active generation.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<CacheRecordRow>,
    /// Number of active records across all pages.
    pub total_count: u64,
}

/// Aggregates over the active generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordMetrics {
    pub total_franchises: u64,
    pub total_outlets: u64,
    pub total_active_outlets: u64,
}

/// Outcome of promoting a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    /// Rows of the promoted job made visible.
    pub activated: u64,
    /// Rows of other jobs deleted.
    pub removed: u64,
}

/// Convert a count for binding. Counts never approach `i64::MAX` in practice.
pub(crate) fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a stored count back. Negative values cannot be written by this crate.
pub(crate) fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
