use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::entities::JobQueueItem;
use jobmesh_errors::MeshResult;

/// 节点对派发请求的答复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResponse {
    Accepted,
    /// 节点判定作业无效，任何节点都无法执行
    BadRequest(String),
    /// 节点正忙
    Conflict,
    /// 超时、连接失败或 5xx
    Failed(String),
}

/// Manager 访问 Worker Node 的接口，网络故障不以错误形式抛出
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn post_job(&self, node_url: &str, item: &JobQueueItem) -> DispatchResponse;
    /// 节点以 2xx 确认取消时返回 `true`
    async fn cancel_job(&self, node_url: &str, job_id: Uuid) -> bool;
    async fn update_job(&self, node_url: &str, job_id: Uuid) -> bool;
    async fn is_alive(&self, node_url: &str) -> bool;
}

/// Worker Node 访问 Manager 的接口
#[async_trait]
pub trait ManagerTransport: Send + Sync {
    /// 向 Manager 的 `endpoint` POST JSON；非 2xx 视为失败
    async fn post_json(&self, endpoint: &str, body: &Value) -> MeshResult<()>;
}
