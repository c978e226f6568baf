pub mod config;
pub mod logging;

pub use config::{
    AppConfig, ConfigValidator, DatabaseConfig, ManagerConfig, NodeConfig, ObservabilityConfig,
    ValidationUtils,
};
pub use jobmesh_errors::{MeshError, MeshResult};
