mod manager_client;
mod node_client;

pub use manager_client::HttpManagerClient;
pub use node_client::HttpNodeClient;
