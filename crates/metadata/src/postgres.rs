//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::records::{page_bounds, search_limit, search_pattern};
use crate::repos::{CacheRecordRepo, GenerationRepo, ImportJobRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use dircache_core::config::PgSslMode;
use dircache_core::{FranchiseRecord, ImportJobStatus, RecordSort};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password arrive separately, e.g. through an environment variable.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements cannot hold more than one command.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ImportJobRepo for PostgresStore {
    async fn create_import_job(&self, job: &ImportJobRow) -> MetadataResult<()> {
        match sqlx::query(
            r#"
            INSERT INTO import_jobs (job_id, status, trigger_source, requested_by, processed_count,
                total_count, pages_fetched, error_message, started_at, finished_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(job.job_id)
        .bind(&job.status)
        .bind(&job.trigger_source)
        .bind(&job.requested_by)
        .bind(job.processed_count)
        .bind(job.total_count)
        .bind(job.pages_fetched)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                MetadataError::AlreadyExists(format!("import job {} already exists", job.job_id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_import_job(&self, job_id: Uuid) -> MetadataResult<Option<ImportJobRow>> {
        let row = sqlx::query_as::<_, ImportJobRow>("SELECT * FROM import_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_running_import_job(&self) -> MetadataResult<Option<ImportJobRow>> {
        let row = sqlx::query_as::<_, ImportJobRow>(
            "SELECT * FROM import_jobs WHERE status = 'running' ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_recent_import_jobs(&self, limit: u32) -> MetadataResult<Vec<ImportJobRow>> {
        let rows = sqlx::query_as::<_, ImportJobRow>(
            "SELECT * FROM import_jobs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_import_progress(
        &self,
        job_id: Uuid,
        processed_count: u64,
        total_count: Option<u64>,
        pages_fetched: u64,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            UPDATE import_jobs
            SET processed_count = GREATEST(processed_count, $1),
                total_count = COALESCE(total_count, $2),
                pages_fetched = GREATEST(pages_fetched, $3),
                updated_at = $4
            WHERE job_id = $5 AND status = 'running'
            "#,
        )
        .bind(to_db_count(processed_count))
        .bind(total_count.map(to_db_count))
        .bind(to_db_count(pages_fetched))
        .bind(updated_at)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_orphaned_import_jobs(&self) -> MetadataResult<Vec<ImportJobRow>> {
        let rows = sqlx::query_as::<_, ImportJobRow>(
            "SELECT * FROM import_jobs WHERE status = 'running' ORDER BY started_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CacheRecordRepo for PostgresStore {
    async fn insert_cache_records(
        &self,
        job_id: Uuid,
        first_index: u64,
        records: &[FranchiseRecord],
    ) -> MetadataResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for (offset, record) in records.iter().enumerate() {
            let outlets_json = serde_json::to_string(&record.outlets)?;
            sqlx::query(
                r#"
                INSERT INTO cache_records (job_id, import_index, fid, name, company, company_address,
                    created_at, updated_at, outlets_json, outlet_search_text, outlet_count,
                    active_outlet_count, is_active, inserted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE, $13)
                "#,
            )
            .bind(job_id)
            .bind(to_db_count(first_index + offset as u64))
            .bind(&record.fid)
            .bind(&record.name)
            .bind(&record.company)
            .bind(&record.company_address)
            .bind(&record.created_at)
            .bind(&record.updated_at)
            .bind(outlets_json)
            .bind(record.outlet_search_text())
            .bind(to_db_count(record.outlet_count() as u64))
            .bind(to_db_count(record.active_outlet_count() as u64))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn list_active_records(
        &self,
        page: u32,
        per_page: u32,
        sort: RecordSort,
    ) -> MetadataResult<RecordPage> {
        let (limit, offset) = page_bounds(page, per_page);
        let sql = format!(
            "SELECT * FROM cache_records WHERE is_active = TRUE ORDER BY {} LIMIT $1 OFFSET $2",
            sort.order_by()
        );

        // Page and total must come from one snapshot, which READ COMMITTED does not give.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        let records = sqlx::query_as::<_, CacheRecordRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cache_records WHERE is_active = TRUE")
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(RecordPage {
            records,
            total_count: from_db_count(total),
        })
    }

    async fn search_active_records(
        &self,
        query: &str,
        sort: RecordSort,
        limit: u32,
    ) -> MetadataResult<Vec<CacheRecordRow>> {
        let sql = format!(
            r#"
            SELECT * FROM cache_records
            WHERE is_active = TRUE
              AND (LOWER(COALESCE(name, '')) LIKE $1 ESCAPE '\'
                OR LOWER(COALESCE(company, '')) LIKE $1 ESCAPE '\'
                OR LOWER(COALESCE(fid, '')) LIKE $1 ESCAPE '\'
                OR LOWER(COALESCE(company_address, '')) LIKE $1 ESCAPE '\'
                OR outlet_search_text LIKE $1 ESCAPE '\')
            ORDER BY {}
            LIMIT $2
            "#,
            sort.order_by()
        );

        let rows = sqlx::query_as::<_, CacheRecordRow>(&sql)
            .bind(search_pattern(query))
            .bind(search_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn active_record_metrics(&self) -> MetadataResult<RecordMetrics> {
        // SUM(BIGINT) is NUMERIC in PostgreSQL.
        let (franchises, outlets, active_outlets): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(outlet_count), 0)::BIGINT,
                   COALESCE(SUM(active_outlet_count), 0)::BIGINT
            FROM cache_records
            WHERE is_active = TRUE
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RecordMetrics {
            total_franchises: from_db_count(franchises),
            total_outlets: from_db_count(outlets),
            total_active_outlets: from_db_count(active_outlets),
        })
    }

    async fn count_generation_records(&self, job_id: Uuid) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_records WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(from_db_count(count))
    }
}

#[async_trait]
impl GenerationRepo for PostgresStore {
    async fn promote_generation(
        &self,
        job_id: Uuid,
        finished_at: OffsetDateTime,
    ) -> MetadataResult<SwapStats> {
        let mut tx = self.pool.begin().await?;

        let completed = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = $1,
                total_count = COALESCE(total_count, processed_count),
                finished_at = $2,
                updated_at = $2
            WHERE job_id = $3 AND status = 'running'
            "#,
        )
        .bind(ImportJobStatus::Completed.as_str())
        .bind(finished_at)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        if completed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(MetadataError::Constraint(format!(
                "import job {job_id} is not running"
            )));
        }

        let activated = sqlx::query("UPDATE cache_records SET is_active = TRUE WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let removed = sqlx::query("DELETE FROM cache_records WHERE job_id <> $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(SwapStats { activated, removed })
    }

    async fn discard_generation(
        &self,
        job_id: Uuid,
        finished_at: OffsetDateTime,
        error_message: &str,
    ) -> MetadataResult<u64> {
        let mut tx = self.pool.begin().await?;

        let failed = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = $1, error_message = $2, finished_at = $3, updated_at = $3
            WHERE job_id = $4 AND status = 'running'
            "#,
        )
        .bind(ImportJobStatus::Failed.as_str())
        .bind(error_message)
        .bind(finished_at)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        if failed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(MetadataError::Constraint(format!(
                "import job {job_id} is not running"
            )));
        }

        let removed = sqlx::query("DELETE FROM cache_records WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed)
    }
}
