use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobmesh_errors::{MeshError, MeshResult};

/// 等待分配的作业
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQueueItem {
    pub job_id: Uuid,
    pub name: String,
    pub serialized: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
}

impl JobQueueItem {
    pub fn new(request: NewJobRequest) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            name: request.name,
            serialized: request.serialized,
            job_type: request.job_type,
            created_by: request.created_by,
            created: Utc::now(),
        }
    }
}

/// 已被节点接收的作业（执行中或已结束）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub name: String,
    pub serialized: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub result: Option<JobResult>,
    pub sent_to_worker_node: String,
}

impl Job {
    pub fn from_queue_item(item: &JobQueueItem, node_url: &str, started: DateTime<Utc>) -> Self {
        Self {
            job_id: item.job_id,
            name: item.name.clone(),
            serialized: item.serialized.clone(),
            job_type: item.job_type.clone(),
            created_by: item.created_by.clone(),
            created: item.created,
            started,
            ended: None,
            result: None,
            sent_to_worker_node: node_url.to_string(),
        }
    }

    /// 重新入队时保留原始的 id 与创建时间
    pub fn to_queue_item(&self) -> JobQueueItem {
        JobQueueItem {
            job_id: self.job_id,
            name: self.name.clone(),
            serialized: self.serialized.clone(),
            job_type: self.job_type.clone(),
            created_by: self.created_by.clone(),
            created: self.created,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn is_canceling(&self) -> bool {
        self.ended.is_none() && self.result == Some(JobResult::Canceling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobResult {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Canceled")]
    Canceled,
    #[serde(rename = "Fatal Node Failure")]
    FatalNodeFailure,
    /// 取消请求已送达节点，等待节点确认；`ended` 仍为空
    #[serde(rename = "Canceling")]
    Canceling,
    #[serde(rename = "Removed because of bad request")]
    RemovedBecauseOfBadRequest,
}

impl JobResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobResult::Success => "Success",
            JobResult::Failed => "Failed",
            JobResult::Canceled => "Canceled",
            JobResult::FatalNodeFailure => "Fatal Node Failure",
            JobResult::Canceling => "Canceling",
            JobResult::RemovedBecauseOfBadRequest => "Removed because of bad request",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobResult::Canceling)
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobResult {
    type Err = MeshError;

    fn from_str(s: &str) -> MeshResult<Self> {
        match s {
            "Success" => Ok(JobResult::Success),
            "Failed" => Ok(JobResult::Failed),
            "Canceled" => Ok(JobResult::Canceled),
            "Fatal Node Failure" => Ok(JobResult::FatalNodeFailure),
            "Canceling" => Ok(JobResult::Canceling),
            "Removed because of bad request" => Ok(JobResult::RemovedBecauseOfBadRequest),
            other => Err(MeshError::Serialization(format!("未知的作业结果: {other}"))),
        }
    }
}

/// 作业审计记录，只追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub id: i64,
    pub job_id: Uuid,
    pub detail: String,
    pub created: DateTime<Utc>,
}

/// `GET /jobhistory/{id}` 的返回体；排队中的作业没有节点和起止时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHistory {
    pub job_id: Uuid,
    pub name: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub sent_to_worker_node: Option<String>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub result: Option<JobResult>,
}

impl From<&Job> for JobHistory {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id,
            name: job.name.clone(),
            created_by: job.created_by.clone(),
            created: job.created,
            sent_to_worker_node: Some(job.sent_to_worker_node.clone()),
            started: Some(job.started),
            ended: job.ended,
            result: job.result,
        }
    }
}

impl From<&JobQueueItem> for JobHistory {
    fn from(item: &JobQueueItem) -> Self {
        Self {
            job_id: item.job_id,
            name: item.name.clone(),
            created_by: item.created_by.clone(),
            created: item.created,
            sent_to_worker_node: None,
            started: None,
            ended: None,
            result: None,
        }
    }
}

/// 客户端提交作业的请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJobRequest {
    pub name: String,
    pub serialized: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub created_by: String,
}

/// 节点上报的进度信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgressReport {
    pub job_id: Uuid,
    pub detail: String,
    pub created: DateTime<Utc>,
}

/// 节点上报的完成或取消状态
///
/// `node_url` 为上报节点的对外地址；作业已被改派到其他节点时回报不生效
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: Uuid,
    pub node_url: String,
}

/// 节点上报的失败状态，附带异常信息与发生时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailureReport {
    pub job_id: Uuid,
    pub node_url: String,
    pub error: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Alive,
    /// 派发失败或探活失败，下次心跳前不参与分配
    Suspect,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerNode {
    pub url: String,
    pub last_heartbeat: DateTime<Utc>,
    pub status: NodeStatus,
}

impl WorkerNode {
    pub fn new(url: String, now: DateTime<Utc>) -> Self {
        Self {
            url,
            last_heartbeat: now,
            status: NodeStatus::Alive,
        }
    }

    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
        self.status = NodeStatus::Alive;
    }

    pub fn is_expired(&self, now: DateTime<Utc>, allowed_down_time: chrono::Duration) -> bool {
        now - self.last_heartbeat > allowed_down_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_result_strings() {
        for result in [
            JobResult::Success,
            JobResult::Failed,
            JobResult::Canceled,
            JobResult::FatalNodeFailure,
            JobResult::Canceling,
            JobResult::RemovedBecauseOfBadRequest,
        ] {
            assert_eq!(result.as_str().parse::<JobResult>().unwrap(), result);
            assert_eq!(
                serde_json::to_string(&result).unwrap(),
                format!("\"{}\"", result.as_str())
            );
        }
        assert!("Unknown".parse::<JobResult>().is_err());
        assert!(!JobResult::Canceling.is_terminal());
        assert!(JobResult::FatalNodeFailure.is_terminal());
    }

    #[test]
    fn test_queue_item_wire_format_uses_type_key() {
        let item = JobQueueItem::new(NewJobRequest {
            name: "job".to_string(),
            serialized: "{}".to_string(),
            job_type: "FastJob".to_string(),
            created_by: "test".to_string(),
        });
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "FastJob");
        assert_eq!(value["job_id"], item.job_id.to_string());
    }

    #[test]
    fn test_requeue_preserves_identity() {
        let item = JobQueueItem::new(NewJobRequest {
            name: "job".to_string(),
            serialized: "{}".to_string(),
            job_type: "FastJob".to_string(),
            created_by: "test".to_string(),
        });
        let job = Job::from_queue_item(&item, "http://node1/", Utc::now());
        assert!(!job.is_ended());
        assert_eq!(job.to_queue_item(), item);
    }

    #[test]
    fn test_worker_node_heartbeat_latest_wins() {
        let now = Utc::now();
        let mut node = WorkerNode::new("http://node1/".to_string(), now);
        node.status = NodeStatus::Suspect;

        node.heartbeat(now - chrono::Duration::seconds(10));
        assert_eq!(node.last_heartbeat, now);
        assert_eq!(node.status, NodeStatus::Alive);

        let later = now + chrono::Duration::seconds(5);
        node.heartbeat(later);
        assert_eq!(node.last_heartbeat, later);
        assert!(!node.is_expired(later, chrono::Duration::seconds(30)));
        assert!(node.is_expired(later + chrono::Duration::seconds(31), chrono::Duration::seconds(30)));
    }
}
