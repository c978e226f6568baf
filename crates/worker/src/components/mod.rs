pub mod execution_wrapper;
pub mod heartbeat;
pub mod progress_sender;
pub mod retrying_sender;

pub use execution_wrapper::{Completion, CurrentJobView, NodeCancelOutcome, SlotState, WorkerWrapper};
pub use heartbeat::HeartbeatPinger;
pub use progress_sender::JobDetailSender;
pub use retrying_sender::RetryingSender;
