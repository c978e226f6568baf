//! 作业持久化抽象
//!
//! 三张逻辑表：`job_queue`（待分配）、`jobs`（执行中或已结束）、`job_details`（审计记录）。
//! 所有跨表修改都在单个事务内完成，保证同一作业 id 只存在于 `job_queue` 或 `jobs` 之一。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Job, JobDetail, JobQueueItem, JobResult};
use jobmesh_errors::MeshResult;

pub const DETAIL_JOB_STARTED: &str = "Job Started";
pub const DETAIL_REMOVED_BAD_REQUEST: &str = "Removed because of bad request";
pub const DETAIL_DELETED: &str = "Deleted";
pub const DETAIL_CANCEL_REQUESTED: &str = "Cancel requested";
pub const DETAIL_JOB_FINISHED: &str = "Job finished";
pub const DETAIL_JOB_CANCELED: &str = "Job was canceled";
pub const DETAIL_JOB_FAILED: &str = "Job Failed";

pub fn requeue_detail(node_url: &str) -> String {
    format!("Job requeued: Fatal Node Failure on {node_url}")
}

/// 终态对应的审计文本
pub fn terminal_detail(result: JobResult, error: Option<&str>) -> String {
    match (result, error) {
        (JobResult::Success, _) => DETAIL_JOB_FINISHED.to_string(),
        (JobResult::Canceled, _) => DETAIL_JOB_CANCELED.to_string(),
        (JobResult::Failed, Some(error)) if !error.is_empty() => {
            format!("{DETAIL_JOB_FAILED}: {error}")
        }
        (JobResult::Failed, _) => DETAIL_JOB_FAILED.to_string(),
        (other, _) => other.as_str().to_string(),
    }
}

/// 已锁定的队首作业
///
/// 持有期间事务保持打开，其他分配流程无法认领同一行。
/// 必须以 `promote_to_job`、`remove_bad_request` 或 `release` 之一结束；
/// 直接丢弃等同于 `release`。
#[async_trait]
pub trait QueueClaim: Send {
    fn item(&self) -> &JobQueueItem;

    /// 节点已接收：写入 `jobs`、删除队列行、追加 "Job Started"，然后提交
    async fn promote_to_job(self: Box<Self>, node_url: &str, started: DateTime<Utc>)
        -> MeshResult<Job>;

    /// 节点判定为无效请求：写入终态作业、删除队列行并提交
    async fn remove_bad_request(self: Box<Self>, node_url: &str) -> MeshResult<Job>;

    /// 回滚，队列行保持不变
    async fn release(self: Box<Self>) -> MeshResult<()>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn enqueue(&self, item: &JobQueueItem) -> MeshResult<()>;

    /// 锁定最早的队列项；队列为空时返回 `None`
    async fn claim_next_queue_item(&self) -> MeshResult<Option<Box<dyn QueueClaim>>>;

    async fn has_queued_items(&self) -> MeshResult<bool>;

    /// 持有未结束作业的节点地址
    async fn busy_node_urls(&self) -> MeshResult<Vec<String>>;

    /// 把节点上未结束的作业放回队列，保留原 id 与创建时间；返回被放回的作业 id
    async fn requeue_unended_job_for_node(&self, node_url: &str) -> MeshResult<Vec<Uuid>>;

    /// 只对 `ended` 为空且仍属于 `node_url` 的作业生效；返回是否实际更新
    async fn apply_terminal_result(
        &self,
        job_id: Uuid,
        node_url: &str,
        result: JobResult,
        detail: &str,
        ended: DateTime<Utc>,
    ) -> MeshResult<bool>;

    /// 标记为 Canceling 并追加审计记录；作业已结束时返回 `false`
    async fn mark_canceling(&self, job_id: Uuid) -> MeshResult<bool>;

    /// 作业仍在队列中时删除并追加 "Deleted"；返回是否删除
    async fn delete_queue_item_if_exists(&self, job_id: Uuid) -> MeshResult<bool>;

    async fn add_detail(&self, job_id: Uuid, detail: &str, created: DateTime<Utc>)
        -> MeshResult<()>;

    /// 作业是否存在于 `job_queue` 或 `jobs`
    async fn job_exists(&self, job_id: Uuid) -> MeshResult<bool>;

    async fn get_job(&self, job_id: Uuid) -> MeshResult<Option<Job>>;
    async fn get_queue_item(&self, job_id: Uuid) -> MeshResult<Option<JobQueueItem>>;
    async fn details(&self, job_id: Uuid) -> MeshResult<Vec<JobDetail>>;
    async fn all_jobs(&self) -> MeshResult<Vec<Job>>;
    async fn executing_jobs(&self) -> MeshResult<Vec<Job>>;
    async fn queued_items(&self) -> MeshResult<Vec<JobQueueItem>>;

    /// 删除早于 `older_than` 的已结束作业，最多 `batch_size` 行；返回删除行数
    async fn purge_ended_jobs(&self, older_than: DateTime<Utc>, batch_size: u32)
        -> MeshResult<u64>;
}
