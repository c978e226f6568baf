//! Manager 与 Worker Node 的 HTTP 路径

pub mod manager {
    pub const JOB: &str = "job";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const NODE_INITIALIZED: &str = "nodeinitialized";
    pub const JOB_PROGRESS: &str = "jobprogress";
    pub const JOB_DONE: &str = "jobdone";
    pub const JOB_CANCELED: &str = "jobcanceled";
    pub const JOB_FAILED: &str = "jobfailed";
    pub const JOB_HISTORY: &str = "jobhistory";
    pub const JOB_HISTORY_DETAILS: &str = "jobhistorydetails";
}

pub mod node {
    pub const JOB: &str = "job";
    pub const IS_ALIVE: &str = "isalive";
}

/// 拼接基础地址与相对路径，处理多余或缺失的斜杠
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
