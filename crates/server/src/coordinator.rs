//! Import job coordinator: single-flight start, background run and finalize.

use crate::ingest::{IngestError, IngestSummary, Ingestor};
use crate::metrics;
use crate::state::ImportTaskRegistry;
use dircache_core::config::ImportConfig;
use dircache_core::{ImportJobStatus, ImportTrigger};
use dircache_metadata::models::ImportJobRow;
use dircache_metadata::{MetadataResult, MetadataStore};
use dircache_upstream::DirectoryApi;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Error message stored on jobs found `running` at startup.
const ORPHANED_JOB_MESSAGE: &str = "interrupted: server stopped while the import was running";

/// What `start` did.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A new job was created and its run spawned.
    Started(ImportJobRow),
    /// A job was already running; it is returned unchanged.
    AlreadyRunning(ImportJobRow),
}

impl StartOutcome {
    pub fn job(&self) -> &ImportJobRow {
        match self {
            Self::Started(job) | Self::AlreadyRunning(job) => job,
        }
    }

    pub fn into_job(self) -> ImportJobRow {
        match self {
            Self::Started(job) | Self::AlreadyRunning(job) => job,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Owns the "at most one running job" rule for this process.
pub struct ImportCoordinator {
    metadata: Arc<dyn MetadataStore>,
    ingestor: Ingestor,
    registry: Arc<ImportTaskRegistry>,
    start_lock: Mutex<()>,
}

impl ImportCoordinator {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        directory: Arc<dyn DirectoryApi>,
        config: ImportConfig,
        registry: Arc<ImportTaskRegistry>,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(directory, metadata.clone(), config),
            metadata,
            registry,
            start_lock: Mutex::new(()),
        }
    }

    /// Start a refresh unless one is already running.
    ///
    /// Returns as soon as the job row exists; the run continues in the background.
    pub async fn start(
        &self,
        trigger: ImportTrigger,
        requested_by: Option<String>,
    ) -> MetadataResult<StartOutcome> {
        let _guard = self.start_lock.lock().await;

        if let Some(running) = self.metadata.get_running_import_job().await? {
            tracing::info!(
                job_id = %running.job_id,
                trigger = %trigger,
                "Import already running, not starting another"
            );
            return Ok(StartOutcome::AlreadyRunning(running));
        }

        let job = ImportJobRow::new_running(trigger, requested_by, OffsetDateTime::now_utc());
        self.metadata.create_import_job(&job).await?;

        metrics::IMPORT_JOBS_STARTED.inc();
        metrics::IMPORT_JOBS_ACTIVE.inc();
        tracing::info!(
            job_id = %job.job_id,
            trigger = %trigger,
            requested_by = ?job.requested_by,
            "Import job created"
        );

        let job_id = job.job_id;
        let ingestor = self.ingestor.clone();
        let metadata = self.metadata.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = ingestor.run(job_id).await;
            let status = finalize(metadata.as_ref(), job_id, result).await;

            metrics::IMPORT_JOBS_ACTIVE.dec();
            metrics::IMPORT_JOBS_FINISHED
                .with_label_values(&[status.as_str()])
                .inc();
            metrics::IMPORT_JOB_DURATION
                .with_label_values(&[status.as_str()])
                .observe(started.elapsed().as_secs_f64());
        });
        self.registry.register(job_id, handle).await;

        Ok(StartOutcome::Started(job))
    }

    /// Current state of a job.
    pub async fn status(&self, job_id: Uuid) -> MetadataResult<Option<ImportJobRow>> {
        self.metadata.get_import_job(job_id).await
    }

    /// Most recent jobs first.
    pub async fn recent(&self, limit: u32) -> MetadataResult<Vec<ImportJobRow>> {
        self.metadata.list_recent_import_jobs(limit).await
    }
}

/// Start a cron-triggered refresh every `interval`.
///
/// The first tick fires after one full interval. A tick that finds a job running
/// does nothing.
pub fn spawn_scheduler(
    coordinator: Arc<ImportCoordinator>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Refresh scheduler enabled");
        loop {
            tokio::time::sleep(interval).await;
            match coordinator
                .start(ImportTrigger::Cron, Some("scheduler".to_string()))
                .await
            {
                Ok(StartOutcome::Started(job)) => {
                    tracing::info!(job_id = %job.job_id, "Scheduled refresh started");
                }
                Ok(StartOutcome::AlreadyRunning(job)) => {
                    tracing::debug!(job_id = %job.job_id, "Scheduled refresh skipped, job running");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start scheduled refresh");
                }
            }
        }
    })
}

/// Promote the generation on success, discard it otherwise.
///
/// A failed promotion leaves the previous generation active and discards this one.
pub async fn finalize(
    metadata: &dyn MetadataStore,
    job_id: Uuid,
    result: Result<IngestSummary, IngestError>,
) -> ImportJobStatus {
    let error_message = match result {
        Ok(summary) => match metadata
            .promote_generation(job_id, OffsetDateTime::now_utc())
            .await
        {
            Ok(swap) => {
                tracing::info!(
                    job_id = %job_id,
                    activated = swap.activated,
                    removed = swap.removed,
                    dropped = summary.dropped,
                    pages = summary.pages_fetched,
                    "Import completed, new generation active"
                );
                return ImportJobStatus::Completed;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to promote generation");
                format!("failed to activate imported records: {e}")
            }
        },
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Import failed");
            e.to_string()
        }
    };

    match metadata
        .discard_generation(job_id, OffsetDateTime::now_utc(), &error_message)
        .await
    {
        Ok(removed) => {
            tracing::info!(job_id = %job_id, removed, "Discarded failed generation");
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to discard generation");
        }
    }
    ImportJobStatus::Failed
}

/// Fail every job left `running` by a previous process and drop its rows.
///
/// Must run before the coordinator accepts starts, or the orphan would block them.
pub async fn recover_orphaned_import_jobs(metadata: &dyn MetadataStore) -> MetadataResult<usize> {
    let orphaned = metadata.get_orphaned_import_jobs().await?;
    if orphaned.is_empty() {
        return Ok(0);
    }

    tracing::warn!(
        count = orphaned.len(),
        "Found import jobs from a previous server instance, marking as failed"
    );

    for job in &orphaned {
        let removed = metadata
            .discard_generation(job.job_id, OffsetDateTime::now_utc(), ORPHANED_JOB_MESSAGE)
            .await?;
        tracing::warn!(
            job_id = %job.job_id,
            trigger = %job.trigger_source,
            processed = job.processed_count,
            removed,
            "Marked orphaned import job as failed"
        );
    }

    Ok(orphaned.len())
}
