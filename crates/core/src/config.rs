//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// API access configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// SHA-256 hex digest of the service bearer token.
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    ///
    /// When unset the API accepts unauthenticated requests.
    #[serde(default)]
    pub token_hash: Option<String>,
}

impl ApiConfig {
    /// Test configuration with a known token.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-api-token"
            token_hash: Some(
                "3f98e3ad578064e710ba3876cb369f9c9c29331875673bebb80efe369c17adbd".to_string(),
            ),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.token_hash {
            Some(hash) if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) => {
                Err("api.token_hash must be a 64-character sha256 hex digest".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Cache store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (single-node deployments and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds. Advisory only: slow queries are logged,
        /// never cancelled.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over individual fields.
        url: Option<String>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// Prefer DIRCACHE_METADATA__PASSWORD over storing this in a file.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds. PostgreSQL cancels queries past it.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(60_000)
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(60)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/dircache.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Remote franchise directory connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the directory API (e.g., "https://directory.example.com/api").
    pub base_url: String,
    /// Service account username. Without credentials every call is unavailable.
    #[serde(default)]
    pub username: Option<String>,
    /// Prefer DIRCACHE_DIRECTORY__PASSWORD over storing this in a file.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_auth_path")]
    pub auth_path: String,
    #[serde(default = "default_franchises_path")]
    pub franchises_path: String,
    /// Outlet lookup path; `{fid}` and `{oid}` are substituted.
    #[serde(default = "default_outlet_path")]
    pub outlet_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Tokens are refreshed this many seconds before their reported expiry.
    #[serde(default = "default_token_drift_secs")]
    pub token_drift_secs: u64,
    /// Token lifetime assumed when the auth response carries no expiry.
    #[serde(default = "default_token_ttl_secs")]
    pub default_token_ttl_secs: u64,
}

fn default_auth_path() -> String {
    "/auth/login".to_string()
}

fn default_franchises_path() -> String {
    "/franchises".to_string()
}

fn default_outlet_path() -> String {
    "/franchises/{fid}/outlets/{oid}".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_drift_secs() -> u64 {
    60
}

fn default_token_ttl_secs() -> u64 {
    3600
}

impl DirectoryConfig {
    /// Configuration pointing at `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            auth_path: default_auth_path(),
            franchises_path: default_franchises_path(),
            outlet_path: default_outlet_path(),
            request_timeout_secs: default_request_timeout_secs(),
            token_drift_secs: default_token_drift_secs(),
            default_token_ttl_secs: default_token_ttl_secs(),
        }
    }

    /// Attach service credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        matches!(
            (self.username.as_deref(), self.password.as_deref()),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "directory.base_url must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("directory.request_timeout_secs cannot be 0".to_string());
        }
        if !self.outlet_path.contains("{fid}") || !self.outlet_path.contains("{oid}") {
            return Err(
                "directory.outlet_path must contain both {fid} and {oid} placeholders".to_string(),
            );
        }
        if self.default_token_ttl_secs <= self.token_drift_secs {
            return Err(format!(
                "directory.default_token_ttl_secs ({}) must exceed token_drift_secs ({})",
                self.default_token_ttl_secs, self.token_drift_secs
            ));
        }
        Ok(())
    }
}

/// Refresh (import job) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Rows requested per upstream page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Soft stop: a run never requests more pages than this.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Pause between page requests (default: None = no delay).
    #[serde(default)]
    pub page_delay_ms: Option<u64>,
    /// Run refreshes periodically (disabled by default).
    #[serde(default)]
    pub schedule_enabled: bool,
    /// Interval in seconds between scheduled refreshes (default: 1 hour).
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
    /// Start a refresh as soon as the server is up.
    #[serde(default)]
    pub run_on_startup: bool,
}

fn default_page_size() -> u32 {
    crate::DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    500
}

fn default_schedule_interval_secs() -> u64 {
    3600
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            page_delay_ms: None,
            schedule_enabled: false,
            schedule_interval_secs: default_schedule_interval_secs(),
            run_on_startup: false,
        }
    }
}

impl ImportConfig {
    pub fn schedule_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.schedule_interval_secs)
    }

    pub fn page_delay(&self) -> Option<std::time::Duration> {
        self.page_delay_ms
            .filter(|ms| *ms > 0)
            .map(std::time::Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("import.page_size cannot be 0".to_string());
        }
        if self.max_pages == 0 {
            return Err("import.max_pages cannot be 0".to_string());
        }
        // tokio::time::interval panics on a zero period.
        if self.schedule_enabled && self.schedule_interval_secs == 0 {
            return Err("import.schedule_interval_secs cannot be 0 when scheduling is enabled. \
                 Use a value >= 1 second."
                .to_string());
        }
        Ok(())
    }
}

/// Full application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::for_testing(),
            metadata: MetadataConfig::default(),
            directory: DirectoryConfig::new("http://127.0.0.1:9")
                .with_credentials("test-user", "test-password"),
            import: ImportConfig::default(),
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.api.validate()?;
        self.metadata.validate()?;
        self.directory.validate()?;
        self.import.validate()?;
        Ok(())
    }
}
