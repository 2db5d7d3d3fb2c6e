//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{CacheRecordRepo, GenerationRepo, ImportJobRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ImportJobRepo + CacheRecordRepo + GenerationRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(60));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; the swap transaction and the
            // ingestion inserts never interleave at the statement level.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs = query_timeout.as_secs(),
            "SQLite metadata store ready (query timeout is advisory only)"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// SQLite cannot cancel statements; long reads are reported instead.
    fn warn_if_slow(&self, operation: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.query_timeout.as_secs(),
                "SQLite query exceeded advisory timeout"
            );
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;

        // Caches created before outlet search text was stored.
        let has_search_text: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('cache_records') WHERE name = 'outlet_search_text'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_search_text == 0 {
            sqlx::query(
                "ALTER TABLE cache_records ADD COLUMN outlet_search_text TEXT NOT NULL DEFAULT ''",
            )
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::records::{page_bounds, search_limit, search_pattern};
    use dircache_core::{FranchiseRecord, ImportJobStatus, RecordSort};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl ImportJobRepo for SqliteStore {
        async fn create_import_job(&self, job: &ImportJobRow) -> MetadataResult<()> {
            match sqlx::query(
                r#"
                INSERT INTO import_jobs (job_id, status, trigger_source, requested_by, processed_count,
                    total_count, pages_fetched, error_message, started_at, finished_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
                Err(sqlx::Error::Database(db_err))
                    if db_err.message().contains("UNIQUE constraint") =>
                {
                    Err(MetadataError::AlreadyExists(format!(
                        "import job {} already exists",
                        job.job_id
                    )))
                }
                Err(e) => Err(e.into()),
            }
        }

        async fn get_import_job(&self, job_id: Uuid) -> MetadataResult<Option<ImportJobRow>> {
            let row =
                sqlx::query_as::<_, ImportJobRow>("SELECT * FROM import_jobs WHERE job_id = ?")
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
                "SELECT * FROM import_jobs ORDER BY started_at DESC LIMIT ?",
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
                SET processed_count = MAX(processed_count, ?),
                    total_count = COALESCE(total_count, ?),
                    pages_fetched = MAX(pages_fetched, ?),
                    updated_at = ?
                WHERE job_id = ? AND status = 'running'
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
    impl CacheRecordRepo for SqliteStore {
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
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
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
            let started = Instant::now();
            let (limit, offset) = page_bounds(page, per_page);
            let sql = format!(
                "SELECT * FROM cache_records WHERE is_active = 1 ORDER BY {} LIMIT ? OFFSET ?",
                sort.order_by()
            );

            // Page and total come from the same snapshot.
            let mut tx = self.pool.begin().await?;
            let records = sqlx::query_as::<_, CacheRecordRow>(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *tx)
                .await?;
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM cache_records WHERE is_active = 1")
                    .fetch_one(&mut *tx)
                    .await?;
            tx.commit().await?;

            self.warn_if_slow("list_active_records", started);
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
            let started = Instant::now();
            let pattern = search_pattern(query);
            let sql = format!(
                r#"
                SELECT * FROM cache_records
                WHERE is_active = 1
                  AND (LOWER(COALESCE(name, '')) LIKE ?1 ESCAPE '\'
                    OR LOWER(COALESCE(company, '')) LIKE ?1 ESCAPE '\'
                    OR LOWER(COALESCE(fid, '')) LIKE ?1 ESCAPE '\'
                    OR LOWER(COALESCE(company_address, '')) LIKE ?1 ESCAPE '\'
                    OR outlet_search_text LIKE ?1 ESCAPE '\')
                ORDER BY {}
                LIMIT ?2
                "#,
                sort.order_by()
            );

            let rows = sqlx::query_as::<_, CacheRecordRow>(&sql)
                .bind(pattern)
                .bind(search_limit(limit))
                .fetch_all(&self.pool)
                .await?;

            self.warn_if_slow("search_active_records", started);
            Ok(rows)
        }

        async fn active_record_metrics(&self) -> MetadataResult<RecordMetrics> {
            let (franchises, outlets, active_outlets): (i64, i64, i64) = sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(outlet_count), 0),
                       COALESCE(SUM(active_outlet_count), 0)
                FROM cache_records
                WHERE is_active = 1
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
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM cache_records WHERE job_id = ?")
                    .bind(job_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(from_db_count(count))
        }
    }

    #[async_trait]
    impl GenerationRepo for SqliteStore {
        async fn promote_generation(
            &self,
            job_id: Uuid,
            finished_at: OffsetDateTime,
        ) -> MetadataResult<SwapStats> {
            let mut tx = self.pool.begin().await?;

            let completed = sqlx::query(
                r#"
                UPDATE import_jobs
                SET status = ?,
                    total_count = COALESCE(total_count, processed_count),
                    finished_at = ?,
                    updated_at = ?
                WHERE job_id = ? AND status = 'running'
                "#,
            )
            .bind(ImportJobStatus::Completed.as_str())
            .bind(finished_at)
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

            let activated = sqlx::query("UPDATE cache_records SET is_active = 1 WHERE job_id = ?")
                .bind(job_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let removed = sqlx::query("DELETE FROM cache_records WHERE job_id <> ?")
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
                SET status = ?, error_message = ?, finished_at = ?, updated_at = ?
                WHERE job_id = ? AND status = 'running'
                "#,
            )
            .bind(ImportJobStatus::Failed.as_str())
            .bind(error_message)
            .bind(finished_at)
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

            let removed = sqlx::query("DELETE FROM cache_records WHERE job_id = ?")
                .bind(job_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            tx.commit().await?;
            Ok(removed)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS import_jobs (
    job_id BLOB PRIMARY KEY,
    status TEXT NOT NULL,
    trigger_source TEXT NOT NULL,
    requested_by TEXT,
    processed_count INTEGER NOT NULL DEFAULT 0,
    total_count INTEGER,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_import_jobs_status ON import_jobs(status);
CREATE INDEX IF NOT EXISTS idx_import_jobs_started ON import_jobs(started_at DESC);

CREATE TABLE IF NOT EXISTS cache_records (
    record_id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id BLOB NOT NULL,
    import_index INTEGER NOT NULL,
    fid TEXT,
    name TEXT,
    company TEXT,
    company_address TEXT,
    created_at TEXT,
    updated_at TEXT,
    outlets_json TEXT NOT NULL DEFAULT '[]',
    outlet_search_text TEXT NOT NULL DEFAULT '',
    outlet_count INTEGER NOT NULL DEFAULT 0,
    active_outlet_count INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 0,
    inserted_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_records_active_index ON cache_records(is_active, import_index DESC);
CREATE INDEX IF NOT EXISTS idx_cache_records_job ON cache_records(job_id);
"#;
