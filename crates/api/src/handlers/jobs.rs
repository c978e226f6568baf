use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use jobmesh_dispatcher::CancelOutcome;
use jobmesh_domain::{Job, JobDetail, JobHistory, JobQueueItem, NewJobRequest, WorkerNode};
use tracing::info;
use uuid::Uuid;

use super::{json_body, parse_job_id};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::routes::ManagerState;

/// 提交作业
pub async fn create_job(
    State(state): State<ManagerState>,
    body: Result<Json<NewJobRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Uuid>> {
    let request = json_body(body)?;
    let job_id = state.job_manager.enqueue(request).await?;
    Ok(ApiResponse::success(job_id))
}

/// 取消作业：排队中的直接删除，执行中的转发给节点
pub async fn cancel_job(
    State(state): State<ManagerState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let job_id = parse_job_id(&id)?;
    match state.job_manager.cancel_job(job_id).await? {
        CancelOutcome::DeletedFromQueue => Ok(ApiResponse::message("Deleted")),
        CancelOutcome::CancelRequested => Ok(ApiResponse::message("Cancel requested")),
        CancelOutcome::NotFound => Err(ApiError::NotFound(format!("作业 {job_id} 不存在"))),
        CancelOutcome::AlreadyFinished => {
            Err(ApiError::Conflict(format!("作业 {job_id} 已经结束")))
        }
        CancelOutcome::AlreadyCanceling => {
            Err(ApiError::Conflict(format!("作业 {job_id} 正在取消中")))
        }
        CancelOutcome::NotDelivered => {
            info!("作业 {} 的取消请求未送达节点", job_id);
            Err(ApiError::BadGateway(format!(
                "节点未确认作业 {job_id} 的取消请求，请稍后重试"
            )))
        }
    }
}

pub async fn job_history(
    State(state): State<ManagerState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<JobHistory>> {
    let job_id = parse_job_id(&id)?;
    Ok(ApiResponse::success(state.job_manager.job_history(job_id).await?))
}

pub async fn job_history_details(
    State(state): State<ManagerState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<JobDetail>>> {
    let job_id = parse_job_id(&id)?;
    Ok(ApiResponse::success(
        state.job_manager.job_history_details(job_id).await?,
    ))
}

pub async fn list_jobs(State(state): State<ManagerState>) -> ApiResult<ApiResponse<Vec<Job>>> {
    Ok(ApiResponse::success(state.job_manager.all_jobs().await?))
}

pub async fn list_queue(
    State(state): State<ManagerState>,
) -> ApiResult<ApiResponse<Vec<JobQueueItem>>> {
    Ok(ApiResponse::success(state.job_manager.queued_items().await?))
}

pub async fn list_nodes(State(state): State<ManagerState>) -> ApiResponse<Vec<WorkerNode>> {
    ApiResponse::success(state.job_manager.nodes().await)
}
