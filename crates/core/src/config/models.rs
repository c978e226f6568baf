use std::time::Duration;

use jobmesh_errors::{MeshError, MeshResult};
use serde::{Deserialize, Serialize};

use super::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub busy_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://jobmesh.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            connection_timeout_seconds: 30,
            busy_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> MeshResult<()> {
        ValidationUtils::validate_not_empty(&self.url, "database.url")?;
        if !self.url.starts_with("sqlite:") {
            return Err(MeshError::config_error("database.url 必须以 sqlite: 开头"));
        }
        ValidationUtils::validate_count(self.max_connections as usize, "database.max_connections")?;
        ValidationUtils::validate_count(self.min_connections as usize, "database.min_connections")?;
        if self.min_connections > self.max_connections {
            return Err(MeshError::config_error(
                "database.min_connections 不能大于 max_connections",
            ));
        }
        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.busy_timeout_seconds,
            "database.busy_timeout_seconds",
        )?;
        Ok(())
    }
}

/// Manager 端配置：分配循环、存活检测与作业清理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub bind_address: String,
    pub allowed_node_down_time_seconds: u64,
    pub assign_interval_ms: u64,
    pub dispatch_timeout_seconds: u64,
    pub send_update_after_dispatch: bool,
    pub purge_jobs_interval_hours: u64,
    pub purge_jobs_older_than_hours: u64,
    pub purge_jobs_batch_size: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9100".to_string(),
            allowed_node_down_time_seconds: 30,
            assign_interval_ms: 1000,
            dispatch_timeout_seconds: 5,
            send_update_after_dispatch: true,
            purge_jobs_interval_hours: 1,
            purge_jobs_older_than_hours: 168,
            purge_jobs_batch_size: 1000,
        }
    }
}

impl ManagerConfig {
    pub fn allowed_node_down_time(&self) -> Duration {
        Duration::from_secs(self.allowed_node_down_time_seconds)
    }

    /// 存活扫描周期为允许宕机时间的五分之一
    pub fn liveness_check_interval(&self) -> Duration {
        let millis = self.allowed_node_down_time_seconds.saturating_mul(1000) / 5;
        Duration::from_millis(millis.max(1))
    }

    pub fn assign_interval(&self) -> Duration {
        Duration::from_millis(self.assign_interval_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_seconds)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_jobs_interval_hours.saturating_mul(3600))
    }

    pub fn purge_older_than(&self) -> Duration {
        Duration::from_secs(self.purge_jobs_older_than_hours.saturating_mul(3600))
    }
}

impl ConfigValidator for ManagerConfig {
    fn validate(&self) -> MeshResult<()> {
        ValidationUtils::validate_bind_address(&self.bind_address, "manager.bind_address")?;
        ValidationUtils::validate_timeout_seconds(
            self.allowed_node_down_time_seconds,
            "manager.allowed_node_down_time_seconds",
        )?;
        ValidationUtils::validate_positive(self.assign_interval_ms, "manager.assign_interval_ms")?;
        ValidationUtils::validate_timeout_seconds(
            self.dispatch_timeout_seconds,
            "manager.dispatch_timeout_seconds",
        )?;
        ValidationUtils::validate_positive(
            self.purge_jobs_interval_hours,
            "manager.purge_jobs_interval_hours",
        )?;
        ValidationUtils::validate_positive(
            self.purge_jobs_older_than_hours,
            "manager.purge_jobs_older_than_hours",
        )?;
        ValidationUtils::validate_count(
            self.purge_jobs_batch_size as usize,
            "manager.purge_jobs_batch_size",
        )?;
        Ok(())
    }
}

/// Worker Node 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_name: String,
    pub bind_address: String,
    pub base_url: String,
    pub manager_url: String,
    pub ping_to_manager_seconds: u64,
    pub status_retry_interval_ms: u64,
    pub startup_notification_interval_ms: u64,
    pub progress_retry_interval_ms: u64,
    pub request_timeout_seconds: u64,
    pub handlers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "node1".to_string(),
            bind_address: "0.0.0.0:9050".to_string(),
            base_url: "http://localhost:9050/".to_string(),
            manager_url: "http://localhost:9100/".to_string(),
            ping_to_manager_seconds: 5,
            status_retry_interval_ms: 500,
            startup_notification_interval_ms: 5000,
            progress_retry_interval_ms: 500,
            request_timeout_seconds: 10,
            handlers: vec![
                "TestJob".to_string(),
                "FastJob".to_string(),
                "FailingJob".to_string(),
            ],
        }
    }
}

impl NodeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_to_manager_seconds)
    }

    pub fn status_retry_interval(&self) -> Duration {
        Duration::from_millis(self.status_retry_interval_ms)
    }

    pub fn startup_notification_interval(&self) -> Duration {
        Duration::from_millis(self.startup_notification_interval_ms)
    }

    pub fn progress_retry_interval(&self) -> Duration {
        Duration::from_millis(self.progress_retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ConfigValidator for NodeConfig {
    fn validate(&self) -> MeshResult<()> {
        ValidationUtils::validate_not_empty(&self.node_name, "node.node_name")?;
        ValidationUtils::validate_bind_address(&self.bind_address, "node.bind_address")?;
        ValidationUtils::validate_http_url(&self.base_url, "node.base_url")?;
        ValidationUtils::validate_http_url(&self.manager_url, "node.manager_url")?;
        ValidationUtils::validate_positive(
            self.ping_to_manager_seconds,
            "node.ping_to_manager_seconds",
        )?;
        ValidationUtils::validate_positive(
            self.status_retry_interval_ms,
            "node.status_retry_interval_ms",
        )?;
        ValidationUtils::validate_positive(
            self.startup_notification_interval_ms,
            "node.startup_notification_interval_ms",
        )?;
        ValidationUtils::validate_positive(
            self.progress_retry_interval_ms,
            "node.progress_retry_interval_ms",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "node.request_timeout_seconds",
        )?;
        if self.handlers.is_empty() {
            return Err(MeshError::config_error("node.handlers 至少需要一个作业处理器"));
        }
        for handler in &self.handlers {
            ValidationUtils::validate_not_empty(handler, "node.handlers")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9900".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> MeshResult<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(MeshError::config_error(format!(
                    "observability.log_level 不支持: {other}"
                )))
            }
        }
        if self.log_format != "pretty" && self.log_format != "json" {
            return Err(MeshError::config_error(format!(
                "observability.log_format 不支持: {}",
                self.log_format
            )));
        }
        if self.metrics_enabled {
            ValidationUtils::validate_bind_address(
                &self.metrics_bind_address,
                "observability.metrics_bind_address",
            )?;
        }
        Ok(())
    }
}
