//! 节点回调 Manager 的接口
//!
//! 终态回报重复、作业未知或作业已改派到其他节点时同样返回 200（`data: false`），节点据此停止重试

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use jobmesh_domain::{JobFailureReport, JobProgressReport, JobStatusReport};
use uuid::Uuid;

use super::json_body;
use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::routes::ManagerState;

pub async fn heartbeat(
    State(state): State<ManagerState>,
    body: Result<Json<String>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let node_url = json_body(body)?;
    state.job_manager.record_heartbeat(&node_url).await?;
    Ok(ApiResponse::message("Heartbeat received"))
}

pub async fn node_initialized(
    State(state): State<ManagerState>,
    body: Result<Json<String>, JsonRejection>,
) -> ApiResult<ApiResponse<Vec<Uuid>>> {
    let node_url = json_body(body)?;
    let requeued = state.job_manager.node_initialized(&node_url).await?;
    Ok(ApiResponse::success(requeued))
}

pub async fn job_progress(
    State(state): State<ManagerState>,
    body: Result<Json<JobProgressReport>, JsonRejection>,
) -> ApiResult<ApiResponse<bool>> {
    let report = json_body(body)?;
    let recorded = state.job_manager.report_progress(&report).await?;
    Ok(ApiResponse::success(recorded))
}

pub async fn job_done(
    State(state): State<ManagerState>,
    body: Result<Json<JobStatusReport>, JsonRejection>,
) -> ApiResult<ApiResponse<bool>> {
    let report = json_body(body)?;
    let applied = state.job_manager.report_done(report.job_id, &report.node_url).await?;
    Ok(ApiResponse::success(applied))
}

pub async fn job_canceled(
    State(state): State<ManagerState>,
    body: Result<Json<JobStatusReport>, JsonRejection>,
) -> ApiResult<ApiResponse<bool>> {
    let report = json_body(body)?;
    let applied = state
        .job_manager
        .report_canceled(report.job_id, &report.node_url)
        .await?;
    Ok(ApiResponse::success(applied))
}

pub async fn job_failed(
    State(state): State<ManagerState>,
    body: Result<Json<JobFailureReport>, JsonRejection>,
) -> ApiResult<ApiResponse<bool>> {
    let report = json_body(body)?;
    let applied = state.job_manager.report_failed(&report).await?;
    Ok(ApiResponse::success(applied))
}
