use std::time::Duration;

use async_trait::async_trait;
use jobmesh_domain::{routes, DispatchResponse, JobQueueItem, NodeTransport};
use jobmesh_errors::{MeshError, MeshResult};
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Manager 调用 Worker Node 的 HTTP 客户端
#[derive(Clone)]
pub struct HttpNodeClient {
    http_client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(timeout: Duration) -> MeshResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeshError::config_error(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self { http_client })
    }

    fn job_url(node_url: &str, job_id: Uuid) -> String {
        routes::endpoint_url(node_url, &format!("{}/{job_id}", routes::node::JOB))
    }
}

#[async_trait]
impl NodeTransport for HttpNodeClient {
    async fn post_job(&self, node_url: &str, item: &JobQueueItem) -> DispatchResponse {
        let url = routes::endpoint_url(node_url, routes::node::JOB);

        match self.http_client.post(&url).json(item).send().await {
            Ok(response) => match response.status() {
                status if status.is_success() => DispatchResponse::Accepted,
                StatusCode::BAD_REQUEST => {
                    let body = response.text().await.unwrap_or_default();
                    DispatchResponse::BadRequest(body)
                }
                StatusCode::CONFLICT => DispatchResponse::Conflict,
                status => DispatchResponse::Failed(format!("HTTP {status}")),
            },
            Err(e) => {
                debug!("向节点 {} 派发作业失败: {}", node_url, e);
                DispatchResponse::Failed(e.to_string())
            }
        }
    }

    async fn cancel_job(&self, node_url: &str, job_id: Uuid) -> bool {
        let url = Self::job_url(node_url, job_id);
        match self.http_client.delete(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                info!(
                    "节点 {} 未接受作业 {} 的取消请求: HTTP {}",
                    node_url,
                    job_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("向节点 {} 发送取消请求失败: {}", node_url, e);
                false
            }
        }
    }

    async fn update_job(&self, node_url: &str, job_id: Uuid) -> bool {
        let url = Self::job_url(node_url, job_id);
        match self.http_client.put(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("向节点 {} 发送状态更新失败: {}", node_url, e);
                false
            }
        }
    }

    async fn is_alive(&self, node_url: &str) -> bool {
        let url = routes::endpoint_url(node_url, routes::node::IS_ALIVE);
        match self.http_client.post(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("节点 {} 探活失败: {}", node_url, e);
                false
            }
        }
    }
}
