//! Import job repository.

use crate::error::MetadataResult;
use crate::models::ImportJobRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for import job bookkeeping.
#[async_trait]
pub trait ImportJobRepo: Send + Sync {
    /// Create an import job.
    async fn create_import_job(&self, job: &ImportJobRow) -> MetadataResult<()>;

    /// Get an import job by ID.
    async fn get_import_job(&self, job_id: Uuid) -> MetadataResult<Option<ImportJobRow>>;

    /// Get the most recently started job still in `running` state, if any.
    async fn get_running_import_job(&self) -> MetadataResult<Option<ImportJobRow>>;

    /// Most recent jobs first.
    async fn list_recent_import_jobs(&self, limit: u32) -> MetadataResult<Vec<ImportJobRow>>;

    /// Record progress for a running job.
    ///
    /// `processed_count` and `pages_fetched` only ever grow: a lower value than the
    /// stored one is ignored. `total_count` is only written while still unset.
    /// Updates to jobs that are no longer running are ignored.
    async fn update_import_progress(
        &self,
        job_id: Uuid,
        processed_count: u64,
        total_count: Option<u64>,
        pages_fetched: u64,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Jobs left in `running` state, e.g. by a crash. Used for recovery at startup.
    async fn get_orphaned_import_jobs(&self) -> MetadataResult<Vec<ImportJobRow>>;
}
