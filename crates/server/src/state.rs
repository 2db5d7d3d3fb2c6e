//! Application state shared across handlers.

use crate::coordinator::ImportCoordinator;
use dircache_core::ImportJobStatus;
use dircache_core::config::AppConfig;
use dircache_metadata::MetadataStore;
use dircache_upstream::DirectoryApi;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How often the watchdog looks for finished import tasks.
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

/// Tracks spawned import tasks so a panicked run does not stay `running` forever.
///
/// A panic skips the task's own finalize step. The watchdog notices the finished
/// handle and discards the job's generation, which unblocks the next start.
pub struct ImportTaskRegistry {
    tasks: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
    metadata: Arc<dyn MetadataStore>,
}

impl ImportTaskRegistry {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            metadata,
        }
    }

    /// Register a spawned import task.
    pub async fn register(&self, job_id: Uuid, handle: JoinHandle<()>) {
        self.tasks.lock().await.insert(job_id, handle);
    }

    /// Number of tasks not yet reaped.
    pub async fn tracked(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Spawn the periodic checker. Keep the returned handle alive.
    pub fn spawn_watchdog(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCHDOG_INTERVAL).await;
                self.check_tasks().await;
            }
        })
    }

    /// Reap finished tasks and fail the jobs of any that panicked.
    pub async fn check_tasks(&self) {
        let finished: Vec<(Uuid, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock().await;
            let done: Vec<Uuid> = tasks
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(job_id, _)| *job_id)
                .collect();
            done.into_iter()
                .filter_map(|job_id| tasks.remove(&job_id).map(|handle| (job_id, handle)))
                .collect()
        };

        for (job_id, handle) in finished {
            match handle.await {
                Ok(()) => {
                    tracing::debug!(job_id = %job_id, "Import task completed");
                }
                Err(join_err) if join_err.is_panic() => {
                    crate::metrics::IMPORT_JOBS_ACTIVE.dec();
                    crate::metrics::IMPORT_JOBS_PANICKED.inc();
                    crate::metrics::IMPORT_JOBS_FINISHED
                        .with_label_values(&[ImportJobStatus::Failed.as_str()])
                        .inc();
                    tracing::error!(
                        job_id = %job_id,
                        panic = ?join_err,
                        "Import task panicked, discarding its generation"
                    );

                    if let Err(e) = self
                        .metadata
                        .discard_generation(
                            job_id,
                            OffsetDateTime::now_utc(),
                            "import task panicked",
                        )
                        .await
                    {
                        tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            "Failed to mark panicked import job as failed"
                        );
                    }
                }
                Err(join_err) => {
                    crate::metrics::IMPORT_JOBS_ACTIVE.dec();
                    tracing::warn!(
                        job_id = %job_id,
                        error = ?join_err,
                        "Import task was cancelled"
                    );
                }
            }
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metadata: Arc<dyn MetadataStore>,
    pub directory: Arc<dyn DirectoryApi>,
    pub coordinator: Arc<ImportCoordinator>,
    pub task_registry: Arc<ImportTaskRegistry>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        directory: Arc<dyn DirectoryApi>,
        task_registry: Arc<ImportTaskRegistry>,
    ) -> Self {
        let coordinator = Arc::new(ImportCoordinator::new(
            metadata.clone(),
            directory.clone(),
            config.import.clone(),
            task_registry.clone(),
        ));

        Self {
            config: Arc::new(config),
            metadata,
            directory,
            coordinator,
            task_registry,
        }
    }
}
