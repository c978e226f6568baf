use axum::extract::State;
use axum::Json;
use jobmesh_domain::NodeStatus;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::routes::{ManagerState, NodeState};

/// Manager 健康检查：附带队列深度与节点概况
pub async fn manager_health(State(state): State<ManagerState>) -> ApiResult<Json<Value>> {
    let queued = state.job_manager.queued_items().await?.len();
    let executing = state.job_manager.executing_jobs().await?.len();
    let nodes = state.job_manager.nodes().await;
    let alive = nodes
        .iter()
        .filter(|node| node.status == NodeStatus::Alive)
        .count();

    Ok(Json(json!({
        "status": "ok",
        "role": "manager",
        "queued_jobs": queued,
        "executing_jobs": executing,
        "nodes": { "known": nodes.len(), "alive": alive },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

pub async fn node_health(State(state): State<NodeState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "role": "node",
        "node": state.wrapper.whoami(),
        "slot": state.wrapper.state().await,
        "accepting": state.wrapper.is_accepting(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
