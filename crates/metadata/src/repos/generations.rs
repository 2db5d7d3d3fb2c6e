//! Generation swap repository.

use crate::error::MetadataResult;
use crate::models::SwapStats;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Atomic generation transitions.
///
/// Both operations run in a single transaction and require the job to still be
/// `running`; otherwise they fail with `MetadataError::Constraint` and change nothing.
#[async_trait]
pub trait GenerationRepo: Send + Sync {
    /// Make the job's rows the active generation.
    ///
    /// Activates the job's rows, deletes every row of any other job, marks the job
    /// `completed` and back-fills an unset `total_count` with `processed_count`.
    async fn promote_generation(
        &self,
        job_id: Uuid,
        finished_at: OffsetDateTime,
    ) -> MetadataResult<SwapStats>;

    /// Drop the job's rows and mark it `failed`. The active generation is untouched.
    ///
    /// Returns the number of rows removed.
    async fn discard_generation(
        &self,
        job_id: Uuid,
        finished_at: OffsetDateTime,
        error_message: &str,
    ) -> MetadataResult<u64>;
}
