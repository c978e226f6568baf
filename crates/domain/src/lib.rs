pub mod entities;
pub mod ports;
pub mod repositories;
pub mod routes;
pub mod validation;

pub use entities::*;
pub use jobmesh_errors::{MeshError, MeshResult};
pub use ports::*;
pub use repositories::*;
