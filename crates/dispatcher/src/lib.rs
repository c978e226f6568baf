//! Manager 核心：作业队列与分配引擎、节点注册表与存活监控、作业清理

pub mod counters;
pub mod job_manager;
pub mod liveness_monitor;
pub mod node_registry;
pub mod purge_service;

#[cfg(test)]
mod invariant_tests;
#[cfg(test)]
pub mod test_utils;

pub use job_manager::{AssignmentPass, CancelOutcome, JobManager};
pub use liveness_monitor::NodeLivenessMonitor;
pub use node_registry::NodeRegistry;
pub use purge_service::JobPurgeService;
