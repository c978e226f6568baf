use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jobmesh_core::DatabaseConfig;
use jobmesh_domain::JobRepository;
use jobmesh_errors::{MeshError, MeshResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::sqlite::SqliteJobRepository;

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS job_queue (
        job_id      TEXT PRIMARY KEY NOT NULL,
        name        TEXT NOT NULL,
        serialized  TEXT NOT NULL,
        job_type    TEXT NOT NULL,
        created_by  TEXT NOT NULL,
        created     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        job_id               TEXT PRIMARY KEY NOT NULL,
        name                 TEXT NOT NULL,
        serialized           TEXT NOT NULL,
        job_type             TEXT NOT NULL,
        created_by           TEXT NOT NULL,
        created              TEXT NOT NULL,
        started              TEXT NOT NULL,
        ended                TEXT NULL,
        result               TEXT NULL,
        sent_to_worker_node  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_details (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id   TEXT NOT NULL,
        detail   TEXT NOT NULL,
        created  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_queue_created ON job_queue(created)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_node_ended ON jobs(sent_to_worker_node, ended)",
    "CREATE INDEX IF NOT EXISTS idx_job_details_job_id ON job_details(job_id)",
];

/// SQLite 连接池与表结构初始化
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> MeshResult<Self> {
        let in_memory = config.is_in_memory();
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(MeshError::Database)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .busy_timeout(Duration::from_secs(config.busy_timeout_seconds));

        // 内存库的每个连接都是独立的数据库，只能使用单连接且不能回收
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(MeshError::Database)?;

        info!("数据库连接成功: {}", config.url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 创建 `job_queue`、`jobs`、`job_details` 三张表及索引
    pub async fn migrate(&self) -> MeshResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(MeshError::Database)?;
        }
        debug!("数据库表结构初始化完成");
        Ok(())
    }

    pub async fn health_check(&self) -> MeshResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(MeshError::Database)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        Arc::new(SqliteJobRepository::new(self.pool.clone()))
    }
}
