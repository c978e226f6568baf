use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jobmesh_core::DatabaseConfig;
use jobmesh_domain::{DispatchResponse, JobQueueItem, JobRepository, NewJobRequest, NodeTransport};
use jobmesh_infrastructure::DatabaseManager;
use uuid::Uuid;

use crate::job_manager::JobManager;
use crate::node_registry::NodeRegistry;

pub const NODE1: &str = "http://node1:9050/";
pub const NODE2: &str = "http://node2:9050/";

#[derive(Default)]
struct FakeNodeState {
    dispatch: HashMap<String, DispatchResponse>,
    alive: HashMap<String, bool>,
    cancel: HashMap<String, bool>,
    posted: Vec<(String, Uuid)>,
    canceled: Vec<(String, Uuid)>,
    updated: Vec<(String, Uuid)>,
    probed: Vec<String>,
}

/// 记录调用并按节点返回预设答复；未设置时节点在线且接受所有请求
#[derive(Default)]
pub struct FakeNodeTransport {
    state: Mutex<FakeNodeState>,
}

impl FakeNodeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dispatch(&self, node: &str, response: DispatchResponse) {
        self.state
            .lock()
            .unwrap()
            .dispatch
            .insert(node.to_string(), response);
    }

    pub fn set_alive(&self, node: &str, alive: bool) {
        self.state.lock().unwrap().alive.insert(node.to_string(), alive);
    }

    pub fn set_cancel(&self, node: &str, ok: bool) {
        self.state.lock().unwrap().cancel.insert(node.to_string(), ok);
    }

    pub fn posted(&self) -> Vec<(String, Uuid)> {
        self.state.lock().unwrap().posted.clone()
    }

    pub fn canceled(&self) -> Vec<(String, Uuid)> {
        self.state.lock().unwrap().canceled.clone()
    }

    pub fn updated(&self) -> Vec<(String, Uuid)> {
        self.state.lock().unwrap().updated.clone()
    }

    pub fn probed(&self) -> Vec<String> {
        self.state.lock().unwrap().probed.clone()
    }
}

#[async_trait]
impl NodeTransport for FakeNodeTransport {
    async fn post_job(&self, node_url: &str, item: &JobQueueItem) -> DispatchResponse {
        let mut state = self.state.lock().unwrap();
        state.posted.push((node_url.to_string(), item.job_id));
        state
            .dispatch
            .get(node_url)
            .cloned()
            .unwrap_or(DispatchResponse::Accepted)
    }

    async fn cancel_job(&self, node_url: &str, job_id: Uuid) -> bool {
        let mut state = self.state.lock().unwrap();
        let ok = state.cancel.get(node_url).copied().unwrap_or(true);
        if ok {
            state.canceled.push((node_url.to_string(), job_id));
        }
        ok
    }

    async fn update_job(&self, node_url: &str, job_id: Uuid) -> bool {
        let mut state = self.state.lock().unwrap();
        state.updated.push((node_url.to_string(), job_id));
        true
    }

    async fn is_alive(&self, node_url: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.probed.push(node_url.to_string());
        state.alive.get(node_url).copied().unwrap_or(true)
    }
}

pub async fn memory_repository() -> Arc<dyn JobRepository> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = DatabaseManager::new(&config).await.unwrap();
    db.migrate().await.unwrap();
    db.job_repository()
}

pub async fn setup(
    send_update_after_dispatch: bool,
) -> (JobManager, Arc<FakeNodeTransport>, Arc<dyn JobRepository>) {
    let repo = memory_repository().await;
    let transport = Arc::new(FakeNodeTransport::new());
    let manager = JobManager::new(
        Arc::clone(&repo),
        Arc::clone(&transport) as Arc<dyn NodeTransport>,
        Arc::new(NodeRegistry::new()),
        send_update_after_dispatch,
    );
    (manager, transport, repo)
}

pub fn new_job(job_type: &str) -> NewJobRequest {
    NewJobRequest {
        name: format!("{job_type} job"),
        serialized: r#"{"name":"test"}"#.to_string(),
        job_type: job_type.to_string(),
        created_by: "tests".to_string(),
    }
}
