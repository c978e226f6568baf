use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jobmesh_domain::{routes, JobFailureReport, JobQueueItem, JobStatusReport, ManagerTransport};
use jobmesh_errors::{MeshError, MeshResult};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{JobDetailSender, RetryingSender};
use crate::handler_registry::HandlerRegistry;
use crate::handlers::JobContext;

const WORKER_IS_ALREADY_WORKING: &str = "Node is already working on another job.";
const WORKER_IS_NOT_REGISTERED: &str = "Node has not been registered with the manager yet.";
const JOB_ID_IS_INVALID: &str = "Job to do property=ID is invalid.";
const JOB_NAME_IS_INVALID: &str = "Job to do property=NAME is invalid.";
const JOB_TYPE_IS_EMPTY: &str = "Job to do property=TYPE can not be null or empty string.";
const JOB_CAN_NOT_BE_DESERIALIZED: &str = "Job to do property=SERIALIZED can not be deserialized.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Idle,
    Accepted,
    Running,
    Completed,
    Canceled,
    Faulted,
}

impl SlotState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SlotState::Completed | SlotState::Canceled | SlotState::Faulted
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentJobView {
    pub job_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub state: SlotState,
    pub cancel_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCancelOutcome {
    CancelRequested,
    NotFound,
    AlreadyCanceling,
    AlreadyFinished,
}

/// 处理器的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Done,
    Canceled,
    Faulted {
        error: String,
        occurred: DateTime<Utc>,
    },
}

impl Completion {
    /// 取消令牌触发后处理器仍返回 `Ok` 时按取消处理
    pub fn classify(result: Result<MeshResult<()>, JoinError>, canceled: bool) -> Self {
        match result {
            Ok(Ok(())) if canceled => Completion::Canceled,
            Ok(Ok(())) => Completion::Done,
            Ok(Err(MeshError::JobCanceled)) => Completion::Canceled,
            Ok(Err(e)) => Completion::Faulted {
                error: e.to_string(),
                occurred: Utc::now(),
            },
            Err(e) => Completion::Faulted {
                error: format!("作业处理器异常退出: {e}"),
                occurred: Utc::now(),
            },
        }
    }

    fn state(&self) -> SlotState {
        match self {
            Completion::Done => SlotState::Completed,
            Completion::Canceled => SlotState::Canceled,
            Completion::Faulted { .. } => SlotState::Faulted,
        }
    }
}

struct CurrentJob {
    item: JobQueueItem,
    state: SlotState,
    token: CancellationToken,
}

/// Worker Node 的单作业槽位
///
/// `Idle -> Accepted -> Running -> {Completed | Canceled | Faulted} -> Idle`。
/// 终态回报被 Manager 确认后槽位才回到空闲，回报未送达前节点不接收新作业。
/// 节点启动通知被确认之前槽位不开放，`POST /job` 一律答复 409。
pub struct WorkerWrapper {
    whoami: String,
    base_url: String,
    intake_open: AtomicBool,
    registry: Arc<HandlerRegistry>,
    progress: Arc<JobDetailSender>,
    slot: Mutex<Option<CurrentJob>>,
    done_sender: RetryingSender<Uuid>,
    canceled_sender: RetryingSender<Uuid>,
    faulted_sender: RetryingSender<JobFailureReport>,
}

impl WorkerWrapper {
    pub fn new(
        whoami: String,
        base_url: String,
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn ManagerTransport>,
        progress: Arc<JobDetailSender>,
        status_retry_interval: Duration,
    ) -> Self {
        let done_sender = RetryingSender::new(
            "job done sender",
            routes::manager::JOB_DONE,
            status_retry_interval,
            Arc::clone(&transport),
            status_payload(&base_url),
        );
        let canceled_sender = RetryingSender::new(
            "job canceled sender",
            routes::manager::JOB_CANCELED,
            status_retry_interval,
            Arc::clone(&transport),
            status_payload(&base_url),
        );
        let faulted_sender = RetryingSender::new(
            "job faulted sender",
            routes::manager::JOB_FAILED,
            status_retry_interval,
            transport,
            |report: &JobFailureReport| json!(report),
        );

        Self {
            whoami,
            base_url,
            intake_open: AtomicBool::new(false),
            registry,
            progress,
            slot: Mutex::new(None),
            done_sender,
            canceled_sender,
            faulted_sender,
        }
    }

    pub fn whoami(&self) -> &str {
        &self.whoami
    }

    /// Manager 确认节点启动后开始接收作业
    pub fn open_intake(&self) {
        self.intake_open.store(true, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.intake_open.load(Ordering::SeqCst)
    }

    /// 为 `item` 预留槽位。未注册或正忙时返回 `Conflict`，
    /// 本节点无法执行的作业返回 `ValidationError`
    pub async fn validate_and_accept(&self, item: &JobQueueItem) -> MeshResult<()> {
        let mut slot = self.slot.lock().await;

        if !self.is_accepting() {
            debug!("{} : 尚未向 Manager 注册，拒绝作业 {}", self.whoami, item.job_id);
            return Err(MeshError::conflict(WORKER_IS_NOT_REGISTERED));
        }
        if slot.is_some() {
            return Err(MeshError::conflict(WORKER_IS_ALREADY_WORKING));
        }
        if item.job_id.is_nil() {
            return Err(MeshError::validation_error(JOB_ID_IS_INVALID));
        }
        if item.name.trim().is_empty() {
            return Err(MeshError::validation_error(JOB_NAME_IS_INVALID));
        }
        if item.job_type.trim().is_empty() {
            return Err(MeshError::validation_error(JOB_TYPE_IS_EMPTY));
        }
        if !self.registry.contains(&item.job_type) {
            warn!(
                "{}: The job type [{}] could not be resolved. The job cannot be started.",
                self.whoami, item.job_type
            );
            return Err(MeshError::validation_error(format!(
                "Job to do property=TYPE {}, can not be resolved by container.",
                item.job_type
            )));
        }
        if self
            .registry
            .check(&item.job_type, &item.serialized)
            .is_err()
        {
            return Err(MeshError::validation_error(JOB_CAN_NOT_BE_DESERIALIZED));
        }

        *slot = Some(CurrentJob {
            item: item.clone(),
            state: SlotState::Accepted,
            token: CancellationToken::new(),
        });
        Ok(())
    }

    /// 在后台任务中启动已接收的作业
    pub async fn start_job(self: &Arc<Self>, job_id: Uuid) -> MeshResult<()> {
        let mut slot = self.slot.lock().await;
        let (item, token) = match slot.as_ref() {
            Some(current) if current.item.job_id == job_id && current.state == SlotState::Accepted => {
                (current.item.clone(), current.token.clone())
            }
            _ => {
                return Err(MeshError::conflict(format!(
                    "作业 {job_id} 未被本节点接收"
                )))
            }
        };

        let context = JobContext::new(job_id, token.clone(), Arc::clone(&self.progress));
        let future = match self
            .registry
            .prepare(&item.job_type, &item.serialized, context)
        {
            Ok(future) => future,
            Err(e) => {
                *slot = None;
                return Err(e);
            }
        };
        if let Some(current) = slot.as_mut() {
            current.state = SlotState::Running;
        }
        drop(slot);

        info!(
            "{} : Starting job (id, name) : ({}, {})",
            self.whoami, item.job_id, item.name
        );

        let wrapper = Arc::clone(self);
        tokio::spawn(async move {
            let stopwatch = Instant::now();
            // 处理器在独立任务中运行，panic 以 JoinError 返回
            let result = tokio::spawn(future).await;
            let elapsed = stopwatch.elapsed().as_secs_f64();
            debug!(
                "Job ( id, name, type ) : ( {}, {}, {} ) took ( seconds, minutes ) : ( {:.3}, {:.3} )",
                item.job_id,
                item.name,
                item.job_type,
                elapsed,
                elapsed / 60.0
            );

            let completion = Completion::classify(result, token.is_cancelled());
            wrapper.complete(job_id, completion).await;
        });

        Ok(())
    }

    pub async fn accept_and_start(self: &Arc<Self>, item: JobQueueItem) -> MeshResult<()> {
        self.validate_and_accept(&item).await?;
        self.start_job(item.job_id).await
    }

    pub async fn cancel_job(&self, job_id: Uuid) -> NodeCancelOutcome {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(current) if current.item.job_id == job_id => {
                if current.state.is_finished() {
                    NodeCancelOutcome::AlreadyFinished
                } else if current.token.is_cancelled() {
                    NodeCancelOutcome::AlreadyCanceling
                } else {
                    current.token.cancel();
                    debug!(
                        "{} : Cancel job method called. Cancellation is now requested.",
                        self.whoami
                    );
                    NodeCancelOutcome::CancelRequested
                }
            }
            _ => {
                if !job_id.is_nil() {
                    warn!("{} : Can not cancel job with id : {}", self.whoami, job_id);
                }
                NodeCancelOutcome::NotFound
            }
        }
    }

    /// Manager 提交派发后发送的状态更新通知
    pub async fn update_job(&self, job_id: Uuid) -> bool {
        let slot = self.slot.lock().await;
        let matches = slot
            .as_ref()
            .is_some_and(|current| current.item.job_id == job_id);
        if matches {
            debug!("{} : Manager 已确认作业 {} 的分配", self.whoami, job_id);
        }
        matches
    }

    pub async fn current_job(&self) -> Option<CurrentJobView> {
        let slot = self.slot.lock().await;
        slot.as_ref().map(|current| CurrentJobView {
            job_id: current.item.job_id,
            name: current.item.name.clone(),
            job_type: current.item.job_type.clone(),
            state: current.state,
            cancel_requested: current.token.is_cancelled(),
        })
    }

    pub async fn state(&self) -> SlotState {
        self.slot
            .lock()
            .await
            .as_ref()
            .map_or(SlotState::Idle, |current| current.state)
    }

    /// 通知运行中的作业取消，并停止待发送的状态回报
    pub async fn shutdown(&self) {
        if let Some(current) = self.slot.lock().await.as_ref() {
            current.token.cancel();
        }
        self.disarm_status_senders();
    }

    async fn complete(self: &Arc<Self>, job_id: Uuid, completion: Completion) {
        let mut slot = self.slot.lock().await;
        let Some(current) = slot
            .as_mut()
            .filter(|current| current.item.job_id == job_id)
        else {
            warn!("{} : 作业 {} 已结束，但已不是当前作业", self.whoami, job_id);
            return;
        };
        current.state = completion.state();
        let name = current.item.name.clone();

        self.disarm_status_senders();
        let delivered = match completion {
            Completion::Done => {
                info!(
                    "{} : The task has completed for job ( jobId, jobName ) : ( {}, {} )",
                    self.whoami, job_id, name
                );
                self.done_sender.arm(&job_id)
            }
            Completion::Canceled => {
                info!(
                    "{} : The task has been canceled for job ( jobId, jobName ) : ( {}, {} )",
                    self.whoami, job_id, name
                );
                self.canceled_sender.arm(&job_id)
            }
            Completion::Faulted { error, occurred } => {
                error!(
                    "{} : The task has failed for job ( jobId, jobName ) : ( {}, {} ): {}",
                    self.whoami, job_id, name, error
                );
                self.faulted_sender.arm(&JobFailureReport {
                    job_id,
                    node_url: self.base_url.clone(),
                    error,
                    created: occurred,
                })
            }
        };
        drop(slot);

        let wrapper = Arc::clone(self);
        tokio::spawn(async move { wrapper.await_status_delivery(job_id, delivered).await });
    }

    async fn await_status_delivery(&self, job_id: Uuid, delivered: oneshot::Receiver<()>) {
        if delivered.await.is_err() {
            return;
        }

        let mut slot = self.slot.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| current.item.job_id == job_id && current.state.is_finished())
        {
            *slot = None;
        }
        drop(slot);

        let purged = self.progress.purge(job_id);
        debug!(
            "{} : 作业 {} 的状态已送达，节点空闲（丢弃 {} 条未送达的进度）",
            self.whoami, job_id, purged
        );
    }

    fn disarm_status_senders(&self) {
        self.done_sender.disarm();
        self.canceled_sender.disarm();
        self.faulted_sender.disarm();
    }
}

fn status_payload(base_url: &str) -> impl Fn(&Uuid) -> serde_json::Value + Send + Sync + 'static {
    let node_url = base_url.to_string();
    move |job_id: &Uuid| {
        json!(JobStatusReport {
            job_id: *job_id,
            node_url: node_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;

    use super::*;
    use crate::handlers::{FastJob, JobHandler, TestJob};
    use crate::test_utils::FakeManagerTransport;

    const NODE_URL: &str = "http://node1:9050/";

    struct PanickingJob;

    #[async_trait]
    impl JobHandler for PanickingJob {
        const TYPE_NAME: &'static str = "PanickingJob";

        type Params = Value;

        async fn handle(&self, _params: Value, _context: JobContext) -> MeshResult<()> {
            panic!("handler blew up");
        }
    }

    /// 忽略取消，仍然返回成功
    struct StubbornJob;

    #[async_trait]
    impl JobHandler for StubbornJob {
        const TYPE_NAME: &'static str = "StubbornJob";

        type Params = Value;

        async fn handle(&self, _params: Value, context: JobContext) -> MeshResult<()> {
            context.cancellation_token().cancelled().await;
            Ok(())
        }
    }

    fn wrapper(transport: &Arc<FakeManagerTransport>) -> Arc<WorkerWrapper> {
        let mut registry = HandlerRegistry::from_config(&[
            "TestJob".to_string(),
            "FastJob".to_string(),
            "FailingJob".to_string(),
        ])
        .unwrap();
        registry.register(PanickingJob);
        registry.register(StubbornJob);

        let transport = Arc::clone(transport) as Arc<dyn ManagerTransport>;
        let progress = Arc::new(JobDetailSender::new(
            Arc::clone(&transport),
            Duration::from_millis(10),
        ));
        let wrapper = Arc::new(WorkerWrapper::new(
            "node1 (test)".to_string(),
            NODE_URL.to_string(),
            Arc::new(registry),
            transport,
            progress,
            Duration::from_millis(10),
        ));
        wrapper.open_intake();
        wrapper
    }

    fn item(job_type: &str, serialized: &str) -> JobQueueItem {
        JobQueueItem {
            job_id: Uuid::new_v4(),
            name: format!("{job_type} job"),
            serialized: serialized.to_string(),
            job_type: job_type.to_string(),
            created_by: "tests".to_string(),
            created: Utc::now(),
        }
    }

    fn long_job() -> JobQueueItem {
        item(
            TestJob::TYPE_NAME,
            r#"{"name":"long","duration_ms":60000}"#,
        )
    }

    async fn wait_for_idle(wrapper: &WorkerWrapper) {
        for _ in 0..500 {
            if wrapper.state().await == SlotState::Idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("node did not return to idle");
    }

    fn reported_ids(transport: &FakeManagerTransport, endpoint: &str) -> Vec<String> {
        transport
            .delivered(endpoint)
            .into_iter()
            .map(|body| body["job_id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_completed_job_reports_done_and_returns_to_idle() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let job = item(FastJob::TYPE_NAME, r#"{"name":"quick"}"#);

        wrapper.accept_and_start(job.clone()).await.unwrap();
        wait_for_idle(&wrapper).await;

        assert_eq!(
            reported_ids(&transport, routes::manager::JOB_DONE),
            vec![job.job_id.to_string()]
        );
        assert!(transport.delivered(routes::manager::JOB_CANCELED).is_empty());
        assert!(transport.delivered(routes::manager::JOB_FAILED).is_empty());
        assert_eq!(
            transport.delivered(routes::manager::JOB_DONE)[0]["node_url"],
            NODE_URL
        );
    }

    #[tokio::test]
    async fn test_jobs_are_refused_until_intake_opens() {
        let transport = Arc::new(FakeManagerTransport::new());
        let registry = HandlerRegistry::from_config(&["FastJob".to_string()]).unwrap();
        let shared = Arc::clone(&transport) as Arc<dyn ManagerTransport>;
        let progress = Arc::new(JobDetailSender::new(
            Arc::clone(&shared),
            Duration::from_millis(10),
        ));
        let wrapper = Arc::new(WorkerWrapper::new(
            "node1 (test)".to_string(),
            NODE_URL.to_string(),
            Arc::new(registry),
            shared,
            progress,
            Duration::from_millis(10),
        ));
        let job = item(FastJob::TYPE_NAME, r#"{"name":"early"}"#);

        assert!(!wrapper.is_accepting());
        let err = wrapper.accept_and_start(job.clone()).await.unwrap_err();
        assert!(matches!(err, MeshError::Conflict(ref msg) if msg == WORKER_IS_NOT_REGISTERED));
        assert_eq!(wrapper.state().await, SlotState::Idle);

        wrapper.open_intake();
        wrapper.accept_and_start(job).await.unwrap();
        wait_for_idle(&wrapper).await;
        assert_eq!(transport.delivered(routes::manager::JOB_DONE).len(), 1);
    }

    #[tokio::test]
    async fn test_busy_node_rejects_second_job_and_keeps_running() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let first = long_job();
        wrapper.accept_and_start(first.clone()).await.unwrap();

        let err = wrapper
            .accept_and_start(item(FastJob::TYPE_NAME, r#"{"name":"x"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Conflict(ref msg) if msg == WORKER_IS_ALREADY_WORKING));

        let current = wrapper.current_job().await.unwrap();
        assert_eq!(current.job_id, first.job_id);
        assert_eq!(current.state, SlotState::Running);
        wrapper.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_accepts_only_one_wins() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let a = long_job();
        let b = long_job();

        let (ra, rb) = tokio::join!(wrapper.validate_and_accept(&a), wrapper.validate_and_accept(&b));
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
        assert_eq!(wrapper.state().await, SlotState::Accepted);
    }

    #[tokio::test]
    async fn test_invalid_items_are_bad_requests() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);

        let mut nil_id = item(FastJob::TYPE_NAME, r#"{"name":"x"}"#);
        nil_id.job_id = Uuid::nil();
        let mut no_name = item(FastJob::TYPE_NAME, r#"{"name":"x"}"#);
        no_name.name = String::new();
        let no_type = item("", r#"{"name":"x"}"#);
        let unknown = item("ReportJob", "{}");
        let bad_payload = item(TestJob::TYPE_NAME, r#"{"name":"x"}"#);

        let cases = [
            (nil_id, JOB_ID_IS_INVALID.to_string()),
            (no_name, JOB_NAME_IS_INVALID.to_string()),
            (no_type, JOB_TYPE_IS_EMPTY.to_string()),
            (
                unknown,
                "Job to do property=TYPE ReportJob, can not be resolved by container.".to_string(),
            ),
            (bad_payload, JOB_CAN_NOT_BE_DESERIALIZED.to_string()),
        ];
        for (job, expected) in cases {
            let err = wrapper.validate_and_accept(&job).await.unwrap_err();
            assert!(
                matches!(err, MeshError::ValidationError(ref msg) if *msg == expected),
                "unexpected error {err:?}"
            );
        }
        assert_eq!(wrapper.state().await, SlotState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let job = long_job();
        wrapper.accept_and_start(job.clone()).await.unwrap();

        assert_eq!(wrapper.cancel_job(Uuid::new_v4()).await, NodeCancelOutcome::NotFound);
        assert_eq!(
            wrapper.cancel_job(job.job_id).await,
            NodeCancelOutcome::CancelRequested
        );
        assert_eq!(
            wrapper.cancel_job(job.job_id).await,
            NodeCancelOutcome::AlreadyCanceling
        );

        wait_for_idle(&wrapper).await;
        assert_eq!(
            reported_ids(&transport, routes::manager::JOB_CANCELED),
            vec![job.job_id.to_string()]
        );
        assert!(transport.delivered(routes::manager::JOB_DONE).is_empty());
    }

    #[tokio::test]
    async fn test_ok_after_cancellation_counts_as_canceled() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let job = item("StubbornJob", "{}");
        wrapper.accept_and_start(job.clone()).await.unwrap();

        wrapper.cancel_job(job.job_id).await;
        wait_for_idle(&wrapper).await;
        assert_eq!(
            reported_ids(&transport, routes::manager::JOB_CANCELED),
            vec![job.job_id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_failing_and_panicking_jobs_report_faulted() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);

        let failing = item("FailingJob", r#"{"message":"disk full"}"#);
        wrapper.accept_and_start(failing.clone()).await.unwrap();
        wait_for_idle(&wrapper).await;

        let panicking = item("PanickingJob", "null");
        wrapper.accept_and_start(panicking.clone()).await.unwrap();
        wait_for_idle(&wrapper).await;

        let reports = transport.delivered(routes::manager::JOB_FAILED);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0]["job_id"], json!(failing.job_id));
        assert!(reports[0]["error"].as_str().unwrap().contains("disk full"));
        assert_eq!(reports[0]["node_url"], NODE_URL);
        assert_eq!(reports[1]["job_id"], json!(panicking.job_id));
        assert!(reports[1]["created"].is_string());
    }

    #[tokio::test]
    async fn test_slot_stays_busy_until_status_is_delivered() {
        let transport = Arc::new(FakeManagerTransport::new());
        transport.fail_next(routes::manager::JOB_DONE, 20);
        let wrapper = wrapper(&transport);
        let job = item(FastJob::TYPE_NAME, r#"{"name":"quick"}"#);
        wrapper.accept_and_start(job.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(wrapper.state().await, SlotState::Completed);
        assert_eq!(
            wrapper.cancel_job(job.job_id).await,
            NodeCancelOutcome::AlreadyFinished
        );
        assert!(matches!(
            wrapper.validate_and_accept(&long_job()).await,
            Err(MeshError::Conflict(_))
        ));

        wait_for_idle(&wrapper).await;
        assert_eq!(transport.attempts(routes::manager::JOB_DONE), 21);
        assert_eq!(
            reported_ids(&transport, routes::manager::JOB_DONE),
            vec![job.job_id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_job_matches_current_job_only() {
        let transport = Arc::new(FakeManagerTransport::new());
        let wrapper = wrapper(&transport);
        let job = long_job();
        wrapper.accept_and_start(job.clone()).await.unwrap();

        assert!(wrapper.update_job(job.job_id).await);
        assert!(!wrapper.update_job(Uuid::new_v4()).await);
        wrapper.shutdown().await;
    }

    #[test]
    fn test_classify() {
        assert_eq!(Completion::classify(Ok(Ok(())), false), Completion::Done);
        assert_eq!(Completion::classify(Ok(Ok(())), true), Completion::Canceled);
        assert_eq!(
            Completion::classify(Ok(Err(MeshError::JobCanceled)), false),
            Completion::Canceled
        );
        assert!(matches!(
            Completion::classify(Ok(Err(MeshError::job_execution("x"))), true),
            Completion::Faulted { .. }
        ));
    }
}
