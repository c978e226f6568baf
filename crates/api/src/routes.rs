use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use jobmesh_dispatcher::JobManager;
use jobmesh_worker::WorkerWrapper;

use crate::handlers::{
    health::{manager_health, node_health},
    jobs::{cancel_job, create_job, job_history, job_history_details, list_jobs, list_nodes, list_queue},
    node, node_callbacks,
};

/// Manager 路由状态
#[derive(Clone)]
pub struct ManagerState {
    pub job_manager: Arc<JobManager>,
}

/// Worker Node 路由状态
#[derive(Clone)]
pub struct NodeState {
    pub wrapper: Arc<WorkerWrapper>,
}

pub fn create_manager_routes(state: ManagerState) -> Router {
    Router::new()
        .route("/health", get(manager_health))
        // 客户端接口
        .route("/job", post(create_job))
        .route("/job/{id}", axum::routing::delete(cancel_job))
        .route("/jobhistory/{id}", get(job_history))
        .route("/jobhistorydetails/{id}", get(job_history_details))
        .route("/jobs", get(list_jobs))
        .route("/jobqueue", get(list_queue))
        .route("/nodes", get(list_nodes))
        // 节点回调
        .route("/heartbeat", post(node_callbacks::heartbeat))
        .route("/nodeinitialized", post(node_callbacks::node_initialized))
        .route("/jobprogress", post(node_callbacks::job_progress))
        .route("/jobdone", post(node_callbacks::job_done))
        .route("/jobcanceled", post(node_callbacks::job_canceled))
        .route("/jobfailed", post(node_callbacks::job_failed))
        .with_state(state)
}

pub fn create_node_routes(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(node_health))
        .route("/job", post(node::start_job).get(node::current_job))
        .route(
            "/job/{id}",
            axum::routing::delete(node::cancel_job).put(node::update_job),
        )
        .route("/isalive", post(node::is_alive))
        .with_state(state)
}
