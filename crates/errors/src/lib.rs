use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("作业未找到: {id}")]
    JobNotFound { id: Uuid },
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("请求冲突: {0}")]
    Conflict(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("作业已取消")]
    JobCanceled,
    #[error("作业执行错误: {0}")]
    JobExecution(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type MeshResult<T> = Result<T, MeshError>;

impl MeshError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn job_execution<S: Into<String>>(msg: S) -> Self {
        Self::JobExecution(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(self, MeshError::Internal(_) | MeshError::Configuration(_))
    }
    /// 网络与存储类错误由所属的定时器在下一轮重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MeshError::Database(_)
                | MeshError::DatabaseOperation(_)
                | MeshError::Network(_)
                | MeshError::Timeout(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            MeshError::JobNotFound { .. } => "请求的作业不存在",
            MeshError::ValidationError(_) => "输入数据验证失败",
            MeshError::Conflict(_) => "当前状态不允许该操作",
            MeshError::Timeout(_) => "操作超时，请稍后重试",
            MeshError::Network(_) => "节点暂时不可达，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for MeshError {
    fn from(err: anyhow::Error) -> Self {
        MeshError::Internal(err.to_string())
    }
}
