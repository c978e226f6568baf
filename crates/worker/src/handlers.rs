use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobmesh_domain::JobProgressReport;
use jobmesh_errors::{MeshError, MeshResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::components::JobDetailSender;

/// 作业处理器
///
/// 以 `TYPE_NAME` 注册到 [`HandlerRegistry`](crate::HandlerRegistry)，`Params` 由作业的
/// `serialized` 字段反序列化得到。取消是协作式的：处理器需要自行轮询
/// [`JobContext::is_canceled`]，不轮询的处理器只能等待其自然结束。
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    type Params: DeserializeOwned + Send + 'static;

    async fn handle(&self, params: Self::Params, context: JobContext) -> MeshResult<()>;
}

/// 单次作业执行的上下文
#[derive(Clone)]
pub struct JobContext {
    job_id: Uuid,
    token: CancellationToken,
    progress: Arc<JobDetailSender>,
}

impl JobContext {
    pub fn new(job_id: Uuid, token: CancellationToken, progress: Arc<JobDetailSender>) -> Self {
        Self {
            job_id,
            token,
            progress,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// 进度信息进入发送队列后立即返回
    pub fn report_progress(&self, detail: impl Into<String>) {
        self.progress.push(JobProgressReport {
            job_id: self.job_id,
            detail: detail.into(),
            created: Utc::now(),
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestJobParams {
    pub name: String,
    pub duration_ms: u64,
}

/// 运行 `duration_ms` 毫秒，每 100 毫秒上报一次进度
pub struct TestJob;

#[async_trait]
impl JobHandler for TestJob {
    const TYPE_NAME: &'static str = "TestJob";

    type Params = TestJobParams;

    async fn handle(&self, params: TestJobParams, context: JobContext) -> MeshResult<()> {
        let step = Duration::from_millis(100);
        let total = Duration::from_millis(params.duration_ms);
        let mut elapsed = Duration::ZERO;

        context.report_progress(format!("{} started", params.name));
        while elapsed < total {
            if context.is_canceled() {
                context.report_progress(format!("{} canceled", params.name));
                return Err(MeshError::JobCanceled);
            }

            let wait = step.min(total - elapsed);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = context.cancellation_token().cancelled() => continue,
            }
            elapsed += wait;
            context.report_progress(format!(
                "{} running: {} of {} ms",
                params.name,
                elapsed.as_millis(),
                total.as_millis()
            ));
        }

        debug!("TestJob {} 运行 {:?} 后结束", context.job_id(), total);
        context.report_progress(format!("{} done", params.name));
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastJobParams {
    pub name: String,
}

pub struct FastJob;

#[async_trait]
impl JobHandler for FastJob {
    const TYPE_NAME: &'static str = "FastJob";

    type Params = FastJobParams;

    async fn handle(&self, params: FastJobParams, context: JobContext) -> MeshResult<()> {
        context.report_progress(format!("{} done", params.name));
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailingJobParams {
    pub message: String,
}

/// 总是以给定信息失败
pub struct FailingJob;

#[async_trait]
impl JobHandler for FailingJob {
    const TYPE_NAME: &'static str = "FailingJob";

    type Params = FailingJobParams;

    async fn handle(&self, params: FailingJobParams, _context: JobContext) -> MeshResult<()> {
        Err(MeshError::job_execution(params.message))
    }
}
