//! Server test utilities.

use super::directory::ScriptedDirectory;
use super::metadata::TestMetadata;
use dircache_core::config::AppConfig;
use dircache_metadata::MetadataStore;
use dircache_metadata::models::ImportJobRow;
use dircache_server::{AppState, ImportTaskRegistry, create_router};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Router and state over a temporary SQLite store and a scripted directory.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub directory: Arc<ScriptedDirectory>,
    _metadata: TestMetadata,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new(directory: ScriptedDirectory) -> Self {
        Self::with_config(directory, |_| {}).await
    }

    pub async fn with_config<F>(directory: ScriptedDirectory, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let metadata = TestMetadata::new()
            .await
            .expect("Failed to create metadata store");
        let directory = Arc::new(directory);

        let mut config = AppConfig::for_testing();
        config.import.page_size = 50;
        modifier(&mut config);

        let task_registry = Arc::new(ImportTaskRegistry::new(metadata.store()));
        let state = AppState::new(
            config,
            metadata.store(),
            directory.clone(),
            task_registry,
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            directory,
            _metadata: metadata,
        }
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}

/// Poll until the job leaves `running`.
#[allow(dead_code)]
pub async fn wait_for_job(metadata: &Arc<dyn MetadataStore>, job_id: Uuid) -> ImportJobRow {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let row = metadata
            .get_import_job(job_id)
            .await
            .unwrap()
            .expect("job row missing");
        if !row.is_running() {
            return row;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("import job {job_id} did not finish in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `check` holds for the job row.
#[allow(dead_code)]
pub async fn wait_for_job_state<F>(
    metadata: &Arc<dyn MetadataStore>,
    job_id: Uuid,
    check: F,
) -> ImportJobRow
where
    F: Fn(&ImportJobRow) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let row = metadata
            .get_import_job(job_id)
            .await
            .unwrap()
            .expect("job row missing");
        if check(&row) {
            return row;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("import job {job_id} never reached the expected state: {row:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
