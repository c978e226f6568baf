mod transport;

pub use transport::{DispatchResponse, ManagerTransport, NodeTransport};
