use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobmesh_domain::{
    repositories::{
        requeue_detail, DETAIL_CANCEL_REQUESTED, DETAIL_DELETED, DETAIL_JOB_STARTED,
        DETAIL_REMOVED_BAD_REQUEST,
    },
    Job, JobDetail, JobQueueItem, JobRepository, JobResult, QueueClaim,
};
use jobmesh_errors::{MeshError, MeshResult};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const QUEUE_COLUMNS: &str = "job_id, name, serialized, job_type, created_by, created";
const JOB_COLUMNS: &str = "job_id, name, serialized, job_type, created_by, created, started, ended, result, sent_to_worker_node";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_detail(
        conn: &mut SqliteConnection,
        job_id: Uuid,
        detail: &str,
        created: DateTime<Utc>,
    ) -> MeshResult<()> {
        sqlx::query("INSERT INTO job_details (job_id, detail, created) VALUES ($1, $2, $3)")
            .bind(job_id.to_string())
            .bind(detail)
            .bind(MappingHelpers::format_timestamp(created))
            .execute(conn)
            .await
            .map_err(MeshError::Database)?;
        Ok(())
    }

    async fn insert_queue_item(conn: &mut SqliteConnection, item: &JobQueueItem) -> MeshResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_queue (job_id, name, serialized, job_type, created_by, created)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.job_id.to_string())
        .bind(&item.name)
        .bind(&item.serialized)
        .bind(&item.job_type)
        .bind(&item.created_by)
        .bind(MappingHelpers::format_timestamp(item.created))
        .execute(conn)
        .await
        .map_err(MeshError::Database)?;
        Ok(())
    }

    async fn insert_job(conn: &mut SqliteConnection, job: &Job) -> MeshResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, name, serialized, job_type, created_by, created, started, ended, result, sent_to_worker_node)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.job_id.to_string())
        .bind(&job.name)
        .bind(&job.serialized)
        .bind(&job.job_type)
        .bind(&job.created_by)
        .bind(MappingHelpers::format_timestamp(job.created))
        .bind(MappingHelpers::format_timestamp(job.started))
        .bind(job.ended.map(MappingHelpers::format_timestamp))
        .bind(job.result.map(|r| r.as_str()))
        .bind(&job.sent_to_worker_node)
        .execute(conn)
        .await
        .map_err(MeshError::Database)?;
        Ok(())
    }

    async fn delete_queue_row(conn: &mut SqliteConnection, job_id: Uuid) -> MeshResult<u64> {
        let result = sqlx::query("DELETE FROM job_queue WHERE job_id = $1")
            .bind(job_id.to_string())
            .execute(conn)
            .await
            .map_err(MeshError::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, item), fields(job_id = %item.job_id))]
    async fn enqueue(&self, item: &JobQueueItem) -> MeshResult<()> {
        let mut conn = self.pool.acquire().await.map_err(MeshError::Database)?;
        Self::insert_queue_item(&mut conn, item).await?;
        debug!("作业入队成功: {} ({})", item.name, item.job_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn claim_next_queue_item(&self) -> MeshResult<Option<Box<dyn QueueClaim>>> {
        let mut tx = self.pool.begin().await.map_err(MeshError::Database)?;

        // 首条语句即为写操作，事务从此持有写锁，其他认领者等待提交或回滚
        let row = sqlx::query(&format!(
            r#"
            UPDATE job_queue SET job_id = job_id
            WHERE job_id = (SELECT job_id FROM job_queue ORDER BY created, rowid LIMIT 1)
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .fetch_optional(&mut *tx)
        .await
        .map_err(MeshError::Database)?;

        match row {
            Some(row) => {
                let item = MappingHelpers::row_to_queue_item(&row)?;
                debug!("锁定队列作业: {}", item.job_id);
                Ok(Some(Box::new(SqliteQueueClaim { tx, item })))
            }
            None => {
                tx.commit().await.map_err(MeshError::Database)?;
                Ok(None)
            }
        }
    }

    async fn has_queued_items(&self) -> MeshResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM job_queue LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(MeshError::Database)?;
        Ok(row.is_some())
    }

    async fn busy_node_urls(&self) -> MeshResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT sent_to_worker_node FROM jobs WHERE ended IS NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        Ok(rows.into_iter().map(|(url,)| url).collect())
    }

    #[instrument(skip(self))]
    async fn requeue_unended_job_for_node(&self, node_url: &str) -> MeshResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(MeshError::Database)?;

        let rows = sqlx::query(&format!(
            "DELETE FROM jobs WHERE sent_to_worker_node = $1 AND ended IS NULL RETURNING {JOB_COLUMNS}"
        ))
        .bind(node_url)
        .fetch_all(&mut *tx)
        .await
        .map_err(MeshError::Database)?;

        let now = Utc::now();
        let detail = requeue_detail(node_url);
        let mut requeued = Vec::with_capacity(rows.len());
        for row in &rows {
            let job = MappingHelpers::row_to_job(row)?;
            Self::insert_queue_item(&mut tx, &job.to_queue_item()).await?;
            Self::insert_detail(&mut tx, job.job_id, &detail, now).await?;
            requeued.push(job.job_id);
        }

        tx.commit().await.map_err(MeshError::Database)?;
        Ok(requeued)
    }

    #[instrument(skip(self, detail))]
    async fn apply_terminal_result(
        &self,
        job_id: Uuid,
        node_url: &str,
        result: JobResult,
        detail: &str,
        ended: DateTime<Utc>,
    ) -> MeshResult<bool> {
        let mut tx = self.pool.begin().await.map_err(MeshError::Database)?;

        let updated = sqlx::query(
            r#"
            UPDATE jobs SET ended = $1, result = $2
            WHERE job_id = $3 AND sent_to_worker_node = $4 AND ended IS NULL
            "#,
        )
        .bind(MappingHelpers::format_timestamp(ended))
        .bind(result.as_str())
        .bind(job_id.to_string())
        .bind(node_url)
        .execute(&mut *tx)
        .await
        .map_err(MeshError::Database)?
        .rows_affected();

        if updated == 1 {
            Self::insert_detail(&mut tx, job_id, detail, ended).await?;
        }
        tx.commit().await.map_err(MeshError::Database)?;
        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    async fn mark_canceling(&self, job_id: Uuid) -> MeshResult<bool> {
        let mut tx = self.pool.begin().await.map_err(MeshError::Database)?;

        let updated = sqlx::query(
            "UPDATE jobs SET result = $1 WHERE job_id = $2 AND ended IS NULL",
        )
        .bind(JobResult::Canceling.as_str())
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(MeshError::Database)?
        .rows_affected();

        if updated == 1 {
            Self::insert_detail(&mut tx, job_id, DETAIL_CANCEL_REQUESTED, Utc::now()).await?;
        }
        tx.commit().await.map_err(MeshError::Database)?;
        Ok(updated == 1)
    }

    #[instrument(skip(self))]
    async fn delete_queue_item_if_exists(&self, job_id: Uuid) -> MeshResult<bool> {
        let mut tx = self.pool.begin().await.map_err(MeshError::Database)?;

        let deleted = Self::delete_queue_row(&mut tx, job_id).await?;
        if deleted == 1 {
            Self::insert_detail(&mut tx, job_id, DETAIL_DELETED, Utc::now()).await?;
        }
        tx.commit().await.map_err(MeshError::Database)?;
        Ok(deleted == 1)
    }

    async fn add_detail(
        &self,
        job_id: Uuid,
        detail: &str,
        created: DateTime<Utc>,
    ) -> MeshResult<()> {
        let mut conn = self.pool.acquire().await.map_err(MeshError::Database)?;
        Self::insert_detail(&mut conn, job_id, detail, created).await
    }

    async fn job_exists(&self, job_id: Uuid) -> MeshResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM job_queue WHERE job_id = $1
            UNION ALL
            SELECT 1 FROM jobs WHERE job_id = $2
            LIMIT 1
            "#,
        )
        .bind(job_id.to_string())
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        Ok(row.is_some())
    }

    async fn get_job(&self, job_id: Uuid) -> MeshResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1"))
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(MeshError::Database)?;
        row.as_ref().map(MappingHelpers::row_to_job).transpose()
    }

    async fn get_queue_item(&self, job_id: Uuid) -> MeshResult<Option<JobQueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM job_queue WHERE job_id = $1"
        ))
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        row.as_ref().map(MappingHelpers::row_to_queue_item).transpose()
    }

    async fn details(&self, job_id: Uuid) -> MeshResult<Vec<JobDetail>> {
        let rows = sqlx::query(
            "SELECT id, job_id, detail, created FROM job_details WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        rows.iter().map(MappingHelpers::row_to_detail).collect()
    }

    async fn all_jobs(&self) -> MeshResult<Vec<Job>> {
        let rows = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created DESC"))
            .fetch_all(&self.pool)
            .await
            .map_err(MeshError::Database)?;
        rows.iter().map(MappingHelpers::row_to_job).collect()
    }

    async fn executing_jobs(&self) -> MeshResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE ended IS NULL ORDER BY started"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        rows.iter().map(MappingHelpers::row_to_job).collect()
    }

    async fn queued_items(&self) -> MeshResult<Vec<JobQueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM job_queue ORDER BY created, rowid"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        rows.iter().map(MappingHelpers::row_to_queue_item).collect()
    }

    #[instrument(skip(self))]
    async fn purge_ended_jobs(
        &self,
        older_than: DateTime<Utc>,
        batch_size: u32,
    ) -> MeshResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs WHERE job_id IN (
                SELECT job_id FROM jobs
                WHERE ended IS NOT NULL AND created < $1
                ORDER BY created
                LIMIT $2
            )
            "#,
        )
        .bind(MappingHelpers::format_timestamp(older_than))
        .bind(i64::from(batch_size))
        .execute(&self.pool)
        .await
        .map_err(MeshError::Database)?;
        Ok(result.rows_affected())
    }
}

/// 认领事务；丢弃时 sqlx 自动回滚
pub struct SqliteQueueClaim {
    tx: Transaction<'static, Sqlite>,
    item: JobQueueItem,
}

#[async_trait]
impl QueueClaim for SqliteQueueClaim {
    fn item(&self) -> &JobQueueItem {
        &self.item
    }

    async fn promote_to_job(
        self: Box<Self>,
        node_url: &str,
        started: DateTime<Utc>,
    ) -> MeshResult<Job> {
        let SqliteQueueClaim { mut tx, item } = *self;
        let job = Job::from_queue_item(&item, node_url, started);

        SqliteJobRepository::insert_job(&mut tx, &job).await?;
        SqliteJobRepository::delete_queue_row(&mut tx, item.job_id).await?;
        SqliteJobRepository::insert_detail(&mut tx, item.job_id, DETAIL_JOB_STARTED, started)
            .await?;
        tx.commit().await.map_err(MeshError::Database)?;

        debug!("作业 {} 已分配到节点 {}", job.job_id, node_url);
        Ok(job)
    }

    async fn remove_bad_request(self: Box<Self>, node_url: &str) -> MeshResult<Job> {
        let SqliteQueueClaim { mut tx, item } = *self;
        let now = Utc::now();
        let mut job = Job::from_queue_item(&item, node_url, now);
        job.ended = Some(now);
        job.result = Some(JobResult::RemovedBecauseOfBadRequest);

        SqliteJobRepository::insert_job(&mut tx, &job).await?;
        SqliteJobRepository::delete_queue_row(&mut tx, item.job_id).await?;
        SqliteJobRepository::insert_detail(&mut tx, item.job_id, DETAIL_REMOVED_BAD_REQUEST, now)
            .await?;
        tx.commit().await.map_err(MeshError::Database)?;
        Ok(job)
    }

    async fn release(self: Box<Self>) -> MeshResult<()> {
        let SqliteQueueClaim { tx, item } = *self;
        tx.rollback().await.map_err(MeshError::Database)?;
        debug!("释放队列作业: {}", item.job_id);
        Ok(())
    }
}
