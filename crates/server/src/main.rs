//! Directory cache server binary.

use anyhow::{Context, Result};
use clap::Parser;
use dircache_core::ImportTrigger;
use dircache_core::config::AppConfig;
use dircache_server::coordinator::{StartOutcome, spawn_scheduler};
use dircache_server::{AppState, ImportTaskRegistry, create_router, recover_orphaned_import_jobs};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dircached - mirrors the franchise directory into a local cache
#[derive(Parser, Debug)]
#[command(name = "dircached")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DIRCACHE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Merge the optional config file with `DIRCACHE_` environment variables.
fn load_config(config_path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = std::path::Path::new(config_path).exists();

    if has_config_file {
        tracing::info!(config_path = %config_path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}", config_path);
    }

    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("DIRCACHE_") && key != "DIRCACHE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: dircached --config /path/to/config.toml\n  \
             2. Environment variables: DIRCACHE_DIRECTORY__BASE_URL=https://directory.example.com \
             DIRCACHE_DIRECTORY__USERNAME=svc DIRCACHE_DIRECTORY__PASSWORD=... dircached\n\n\
             See config/server.example.toml for example configuration.\n\
             Set DIRCACHE_CONFIG env var to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("DIRCACHE_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dircached v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    if config.api.token_hash.is_none() {
        tracing::warn!("api.token_hash is not set; the read and refresh API is open to anyone");
    }

    dircache_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let metadata = dircache_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    let recovered = recover_orphaned_import_jobs(metadata.as_ref())
        .await
        .context("failed to recover orphaned import jobs")?;
    tracing::info!(recovered, "Orphaned import jobs recovered");

    let directory = dircache_upstream::from_config(&config.directory)
        .context("failed to initialize directory client")?;
    tracing::info!(base_url = %config.directory.base_url, "Directory client initialized");

    let task_registry = Arc::new(ImportTaskRegistry::new(metadata.clone()));
    let _watchdog_handle = task_registry.clone().spawn_watchdog();
    tracing::info!("Import task watchdog spawned");

    let state = AppState::new(config.clone(), metadata, directory, task_registry);

    if config.import.run_on_startup {
        match state
            .coordinator
            .start(ImportTrigger::Cron, Some("startup".to_string()))
            .await
            .context("failed to start startup refresh")?
        {
            StartOutcome::Started(job) => {
                tracing::info!(job_id = %job.job_id, "Startup refresh started");
            }
            StartOutcome::AlreadyRunning(job) => {
                tracing::info!(job_id = %job.job_id, "Refresh already running at startup");
            }
        }
    }

    if config.import.schedule_enabled {
        spawn_scheduler(state.coordinator.clone(), config.import.schedule_interval());
    } else {
        tracing::info!("Scheduled refresh disabled");
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_config_from_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9090"

[directory]
base_url = "https://directory.example.com/api"
username = "svc"
password = "secret"

[import]
page_size = 50
schedule_enabled = true
schedule_interval_secs = 900
"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert_eq!(config.directory.base_url, "https://directory.example.com/api");
        assert_eq!(config.import.page_size, 50);
        assert_eq!(config.import.schedule_interval_secs, 900);
        assert_eq!(config.import.max_pages, 500);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[directory]
base_url = "ftp://directory.example.com"
"#,
        )
        .unwrap();

        assert!(load_config(path.to_str().unwrap()).is_err());
    }
}
