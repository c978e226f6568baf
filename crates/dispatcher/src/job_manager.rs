//! 作业队列与分配引擎
//!
//! 作业状态机：排队（`job_queue`）→ 已分配（`jobs`，`ended` 为空）→ 终态。
//! 认领与派发在同一事务内完成：先锁定队首作业，再调用节点，根据节点答复提交或回滚。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobmesh_domain::{
    repositories::terminal_detail, validation, DispatchResponse, Job, JobDetail, JobFailureReport,
    JobHistory, JobProgressReport, JobQueueItem, JobRepository, JobResult, NewJobRequest,
    NodeTransport, QueueClaim, WorkerNode,
};
use jobmesh_errors::{MeshError, MeshResult};
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::counters::{
    self, DISPATCH_FAILURES, JOBS_ASSIGNED, JOBS_ENQUEUED, JOBS_REMOVED_BAD_REQUEST, JOBS_REQUEUED,
};
use crate::node_registry::NodeRegistry;

/// 取消请求的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// 作业仍在队列中，已直接删除
    DeletedFromQueue,
    /// 节点已确认取消请求，等待节点回报 Canceled
    CancelRequested,
    NotFound,
    AlreadyFinished,
    AlreadyCanceling,
    /// 节点未确认，作业状态不变，可重试
    NotDelivered,
}

/// 单次分配流程的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentPass {
    pub assigned: usize,
    pub removed: usize,
    pub failed: usize,
}

impl AssignmentPass {
    fn made_progress(&self) -> bool {
        self.assigned + self.removed > 0
    }
}

pub struct JobManager {
    repo: Arc<dyn JobRepository>,
    transport: Arc<dyn NodeTransport>,
    registry: Arc<NodeRegistry>,
    send_update_after_dispatch: bool,
    assign_lock: Mutex<()>,
    assign_trigger: Arc<Notify>,
}

impl JobManager {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        transport: Arc<dyn NodeTransport>,
        registry: Arc<NodeRegistry>,
        send_update_after_dispatch: bool,
    ) -> Self {
        Self {
            repo,
            transport,
            registry,
            send_update_after_dispatch,
            assign_lock: Mutex::new(()),
            assign_trigger: Arc::new(Notify::new()),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// 唤醒分配循环
    pub fn assign_trigger(&self) -> Arc<Notify> {
        Arc::clone(&self.assign_trigger)
    }

    /// 把仍有未结束作业的节点登记到注册表，使其在允许宕机时间后仍未心跳时被回收
    pub async fn restore_registry(&self) -> MeshResult<()> {
        for url in self.repo.busy_node_urls().await? {
            info!("恢复执行中节点: {}", url);
            self.registry.heartbeat(&url).await;
        }
        Ok(())
    }

    pub async fn enqueue(&self, request: NewJobRequest) -> MeshResult<Uuid> {
        validation::validate_new_job(&request)?;
        let item = JobQueueItem::new(request);
        self.repo.enqueue(&item).await?;
        counters::increment(JOBS_ENQUEUED, 1);
        info!("作业入队: {} ({}), 类型 {}", item.name, item.job_id, item.job_type);

        self.assign_trigger.notify_one();
        Ok(item.job_id)
    }

    /// 为每个空闲且探活成功的节点认领并派发一个队列作业
    pub async fn assign_next_job(&self) -> MeshResult<AssignmentPass> {
        let _guard = self.assign_lock.lock().await;
        let mut pass = AssignmentPass::default();

        if !self.repo.has_queued_items().await? {
            return Ok(pass);
        }

        let busy = self.repo.busy_node_urls().await?;
        let candidates: Vec<String> = self
            .registry
            .alive_nodes()
            .await
            .into_iter()
            .filter(|url| !busy.contains(url))
            .collect();

        for node_url in candidates {
            if !self.transport.is_alive(&node_url).await {
                debug!("节点 {} 探活失败，跳过", node_url);
                self.registry.mark_suspect(&node_url).await;
                continue;
            }
            self.registry.heartbeat(&node_url).await;

            let Some(claim) = self.repo.claim_next_queue_item().await? else {
                break;
            };
            self.dispatch(claim, &node_url, &mut pass).await?;
        }

        if pass != AssignmentPass::default() {
            debug!(
                "分配完成: 派发 {} 个, 移除 {} 个, 失败 {} 个",
                pass.assigned, pass.removed, pass.failed
            );
        }
        Ok(pass)
    }

    /// 重复分配直到没有空闲节点或队列为空
    pub async fn assign_until_idle(&self) -> MeshResult<()> {
        loop {
            let pass = self.assign_next_job().await?;
            if !pass.made_progress() {
                return Ok(());
            }
        }
    }

    async fn dispatch(
        &self,
        claim: Box<dyn QueueClaim>,
        node_url: &str,
        pass: &mut AssignmentPass,
    ) -> MeshResult<()> {
        let item = claim.item().clone();
        let job_id = item.job_id;

        match self.transport.post_job(node_url, &item).await {
            DispatchResponse::Accepted => {
                claim.promote_to_job(node_url, Utc::now()).await?;
                pass.assigned += 1;
                counters::increment(JOBS_ASSIGNED, 1);
                info!("作业 {} 已派发到节点 {}", job_id, node_url);

                if self.send_update_after_dispatch
                    && !self.transport.update_job(node_url, job_id).await
                {
                    debug!("向节点 {} 发送作业 {} 的状态更新失败", node_url, job_id);
                }
            }
            DispatchResponse::BadRequest(reason) => {
                claim.remove_bad_request(node_url).await?;
                pass.removed += 1;
                counters::increment(JOBS_REMOVED_BAD_REQUEST, 1);
                warn!("节点 {} 拒绝作业 {}，已移除: {}", node_url, job_id, reason);
            }
            DispatchResponse::Conflict => {
                claim.release().await?;
                info!("节点 {} 正忙，作业 {} 保留在队列中", node_url, job_id);
            }
            DispatchResponse::Failed(reason) => {
                claim.release().await?;
                self.registry.mark_suspect(node_url).await;
                pass.failed += 1;
                counters::increment(DISPATCH_FAILURES, 1);
                warn!("向节点 {} 派发作业 {} 失败: {}", node_url, job_id, reason);
            }
        }
        Ok(())
    }

    pub async fn cancel_job(&self, job_id: Uuid) -> MeshResult<CancelOutcome> {
        if self.repo.delete_queue_item_if_exists(job_id).await? {
            info!("作业 {} 在队列中被取消", job_id);
            return Ok(CancelOutcome::DeletedFromQueue);
        }

        let Some(job) = self.repo.get_job(job_id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if job.is_ended() {
            return Ok(CancelOutcome::AlreadyFinished);
        }
        if job.is_canceling() {
            return Ok(CancelOutcome::AlreadyCanceling);
        }

        if !self
            .transport
            .cancel_job(&job.sent_to_worker_node, job_id)
            .await
        {
            warn!(
                "节点 {} 未确认作业 {} 的取消请求，保持原状态",
                job.sent_to_worker_node, job_id
            );
            return Ok(CancelOutcome::NotDelivered);
        }

        if self.repo.mark_canceling(job_id).await? {
            info!("已请求节点 {} 取消作业 {}", job.sent_to_worker_node, job_id);
            return Ok(CancelOutcome::CancelRequested);
        }

        // 节点可能在标记之前就已回报取消
        let finished = self.repo.get_job(job_id).await?;
        match finished.and_then(|job| job.result) {
            Some(JobResult::Canceled) => Ok(CancelOutcome::CancelRequested),
            _ => Ok(CancelOutcome::AlreadyFinished),
        }
    }

    pub async fn record_heartbeat(&self, node_url: &str) -> MeshResult<()> {
        let url = validation::normalize_node_url(node_url)?;
        self.registry.heartbeat(&url).await;
        Ok(())
    }

    /// 节点重启后其上未结束的作业已丢失，放回队列
    pub async fn node_initialized(&self, node_url: &str) -> MeshResult<Vec<Uuid>> {
        let url = validation::normalize_node_url(node_url)?;
        self.registry.heartbeat(&url).await;

        let requeued = self.repo.requeue_unended_job_for_node(&url).await?;
        if !requeued.is_empty() {
            counters::increment(JOBS_REQUEUED, requeued.len() as u64);
            warn!("节点 {} 重新启动，{} 个作业已重新入队", url, requeued.len());
        }
        self.assign_trigger.notify_one();
        Ok(requeued)
    }

    /// 未知作业的进度只确认不记录；返回是否写入
    pub async fn report_progress(&self, report: &JobProgressReport) -> MeshResult<bool> {
        if !self.repo.job_exists(report.job_id).await? {
            debug!("忽略未知作业 {} 的进度", report.job_id);
            return Ok(false);
        }
        self.repo
            .add_detail(report.job_id, &report.detail, report.created)
            .await?;
        Ok(true)
    }

    pub async fn report_done(&self, job_id: Uuid, node_url: &str) -> MeshResult<bool> {
        self.finish(job_id, node_url, JobResult::Success, None).await
    }

    pub async fn report_canceled(&self, job_id: Uuid, node_url: &str) -> MeshResult<bool> {
        self.finish(job_id, node_url, JobResult::Canceled, None)
            .await
    }

    pub async fn report_failed(&self, report: &JobFailureReport) -> MeshResult<bool> {
        self.finish(
            report.job_id,
            &report.node_url,
            JobResult::Failed,
            Some(&report.error),
        )
        .await
    }

    /// 重复、未知或来自非当前执行节点的终态回报不做任何修改
    async fn finish(
        &self,
        job_id: Uuid,
        node_url: &str,
        result: JobResult,
        error: Option<&str>,
    ) -> MeshResult<bool> {
        let node_url = validation::normalize_node_url(node_url)?;
        let detail = terminal_detail(result, error);
        let applied = self
            .repo
            .apply_terminal_result(job_id, &node_url, result, &detail, Utc::now())
            .await?;

        if applied {
            counters::record_finished(result);
            info!("作业 {} 在节点 {} 结束: {}", job_id, node_url, result);
            self.assign_trigger.notify_one();
        } else {
            debug!(
                "忽略节点 {} 对作业 {} 的终态回报: {}（重复、未知或已改派）",
                node_url, job_id, result
            );
        }
        Ok(applied)
    }

    pub async fn job_history(&self, job_id: Uuid) -> MeshResult<JobHistory> {
        if let Some(job) = self.repo.get_job(job_id).await? {
            return Ok(JobHistory::from(&job));
        }
        if let Some(item) = self.repo.get_queue_item(job_id).await? {
            return Ok(JobHistory::from(&item));
        }
        Err(MeshError::job_not_found(job_id))
    }

    pub async fn job_history_details(&self, job_id: Uuid) -> MeshResult<Vec<JobDetail>> {
        self.repo.details(job_id).await
    }

    pub async fn all_jobs(&self) -> MeshResult<Vec<Job>> {
        self.repo.all_jobs().await
    }

    pub async fn executing_jobs(&self) -> MeshResult<Vec<Job>> {
        self.repo.executing_jobs().await
    }

    pub async fn queued_items(&self) -> MeshResult<Vec<JobQueueItem>> {
        self.repo.queued_items().await
    }

    pub async fn nodes(&self) -> Vec<WorkerNode> {
        self.registry.snapshot().await
    }

    /// 周期性分配；入队、终态回报与节点上线会提前唤醒
    pub async fn run_assignment_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("启动作业分配循环，间隔 {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.assign_trigger.notified() => {}
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止作业分配循环");
                    break;
                }
            }

            if let Err(e) = self.assign_until_idle().await {
                error!("作业分配失败: {}", e);
            }
        }
    }
}
