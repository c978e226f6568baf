use std::time::Duration;

use async_trait::async_trait;
use jobmesh_domain::{routes, ManagerTransport};
use jobmesh_errors::{MeshError, MeshResult};
use serde_json::Value;

/// Worker Node calling back into the Manager.
#[derive(Clone)]
pub struct HttpManagerClient {
    manager_url: String,
    http_client: reqwest::Client,
}

impl HttpManagerClient {
    pub fn new(manager_url: impl Into<String>, timeout: Duration) -> MeshResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeshError::config_error(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            manager_url: manager_url.into(),
            http_client,
        })
    }

    pub fn manager_url(&self) -> &str {
        &self.manager_url
    }
}

#[async_trait]
impl ManagerTransport for HttpManagerClient {
    async fn post_json(&self, endpoint: &str, body: &Value) -> MeshResult<()> {
        let url = routes::endpoint_url(&self.manager_url, endpoint);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MeshError::Timeout(format!("{url}: {e}"))
                } else {
                    MeshError::network(format!("{url}: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MeshError::network(format!("{url}: HTTP {status} {body}")))
        }
    }
}
