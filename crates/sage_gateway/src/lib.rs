pub mod server;
pub mod types;

pub use server::{EngineFactory, GatewayServer};
pub use types::{ErrorFrame, QueryRequest};
