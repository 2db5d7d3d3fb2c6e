//! Cache store abstraction and implementations for the directory cache.
//!
//! This crate owns the durable state of the refresh pipeline:
//! - Import jobs and their progress
//! - Cache records, one generation per job
//! - The atomic promotion (or discard) of a generation
//! - The read API over the active generation

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use postgres::PostgresStore;
pub use store::{MetadataStore, SqliteStore};

use dircache_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportJobRow;
    use dircache_core::config::MetadataConfig;
    use dircache_core::{FranchiseRecord, ImportTrigger, RecordSort};
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("dircache.db");
        let config = MetadataConfig::Sqlite {
            path: db_path.clone(),
            query_timeout_secs: None,
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("dircache.db");
        let config = MetadataConfig::Sqlite {
            path: db_path,
            query_timeout_secs: None,
        };

        let job = ImportJobRow::new_running(ImportTrigger::Manual, None, OffsetDateTime::now_utc());
        {
            let store = from_config(&config).await.unwrap();
            store.create_import_job(&job).await.unwrap();
            let record = FranchiseRecord {
                name: Some("Persisted".to_string()),
                ..Default::default()
            };
            store
                .insert_cache_records(job.job_id, 1, &[record])
                .await
                .unwrap();
            store
                .promote_generation(job.job_id, OffsetDateTime::now_utc())
                .await
                .unwrap();
        }

        let store = from_config(&config).await.unwrap();
        let page = store
            .list_active_records(1, 10, RecordSort::Latest)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].name.as_deref(), Some("Persisted"));
    }
}
