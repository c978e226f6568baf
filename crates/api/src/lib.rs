//! # JobMesh API
//!
//! Manager 与 Worker Node 的 HTTP 接口（axum）。
//!
//! ## Manager
//! - `POST /job` 提交作业，`DELETE /job/{id}` 取消作业
//! - `GET /jobhistory/{id}`、`GET /jobhistorydetails/{id}` 查询作业状态与审计记录
//! - `GET /jobs`、`GET /jobqueue`、`GET /nodes` 诊断查询
//! - `POST /heartbeat`、`/nodeinitialized`、`/jobprogress`、`/jobdone`、`/jobcanceled`、`/jobfailed` 节点回调
//!
//! ## Worker Node
//! - `POST /job` 接收作业，`DELETE /job/{id}` 取消，`PUT /job/{id}` 派发确认
//! - `POST /isalive` 探活，`GET /job` 当前作业
//!
//! 成功响应统一为 `{success, data, message, timestamp}`，
//! 错误响应为 `{success: false, error: {code, message}, timestamp}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use jobmesh_dispatcher::JobManager;
use jobmesh_worker::WorkerWrapper;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_manager_routes, create_node_routes, ManagerState, NodeState};

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;

pub fn create_manager_app(job_manager: Arc<JobManager>) -> Router {
    create_manager_routes(ManagerState { job_manager })
        .layer(axum::middleware::from_fn(request_logging))
        .layer(cors_layer())
        .layer(trace_layer())
}

pub fn create_node_app(wrapper: Arc<WorkerWrapper>) -> Router {
    create_node_routes(NodeState { wrapper })
        .layer(axum::middleware::from_fn(request_logging))
        .layer(trace_layer())
}
