//! JobMesh 应用装配：按模式启动 Manager 或 Worker Node，统一的优雅关闭

pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application};
pub use shutdown::ShutdownManager;
