pub mod components;
pub mod handler_registry;
pub mod handlers;
pub mod service;

#[cfg(test)]
pub mod test_utils;

pub use components::{
    Completion, CurrentJobView, HeartbeatPinger, JobDetailSender, NodeCancelOutcome,
    RetryingSender, SlotState, WorkerWrapper,
};
pub use handler_registry::HandlerRegistry;
pub use handlers::{FailingJob, FastJob, JobContext, JobHandler, TestJob};
pub use service::{whoami, WorkerNodeService};
