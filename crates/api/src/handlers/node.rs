//! Worker Node 对 Manager 暴露的接口

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use jobmesh_domain::JobQueueItem;
use jobmesh_worker::{CurrentJobView, NodeCancelOutcome};
use tracing::info;

use super::{json_body, parse_job_id};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::routes::NodeState;

pub async fn start_job(
    State(state): State<NodeState>,
    body: Result<Json<JobQueueItem>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let item = json_body(body)?;
    let job_name = item.name.clone();
    let job_id = item.job_id;

    if let Err(e) = state.wrapper.accept_and_start(item).await {
        info!(
            "{}: New job request from manager rejected. JobId: {}: {}",
            state.wrapper.whoami(),
            job_id,
            e
        );
        return Err(e.into());
    }

    Ok(ApiResponse::message(format!(
        "{}: Work started for job {}",
        state.wrapper.whoami(),
        job_name
    )))
}

pub async fn cancel_job(
    State(state): State<NodeState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let job_id = parse_job_id(&id)?;
    if job_id.is_nil() {
        return Err(ApiError::BadRequest("作业ID不能为空".to_string()));
    }
    info!("{}: Try cancel job. JobId {}", state.wrapper.whoami(), job_id);

    match state.wrapper.cancel_job(job_id).await {
        NodeCancelOutcome::CancelRequested => Ok(ApiResponse::message("Canceling")),
        NodeCancelOutcome::NotFound => Err(ApiError::NotFound(format!(
            "job {job_id} is not running on this node"
        ))),
        NodeCancelOutcome::AlreadyCanceling => Err(ApiError::Conflict(format!(
            "job {job_id} is already canceling"
        ))),
        NodeCancelOutcome::AlreadyFinished => Err(ApiError::Conflict(format!(
            "job {job_id} has already finished"
        ))),
    }
}

/// Manager 派发提交后的状态通知
pub async fn update_job(
    State(state): State<NodeState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let job_id = parse_job_id(&id)?;
    if state.wrapper.update_job(job_id).await {
        Ok(ApiResponse::message("Job status updated"))
    } else {
        Err(ApiError::NotFound(format!(
            "job {job_id} is not the current job of this node"
        )))
    }
}

pub async fn is_alive() -> ApiResponse<()> {
    ApiResponse::message("alive")
}

pub async fn current_job(State(state): State<NodeState>) -> ApiResponse<Option<CurrentJobView>> {
    ApiResponse::success(state.wrapper.current_job().await)
}
