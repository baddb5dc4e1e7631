mod identity_gateway;
mod session_store;

pub use identity_gateway::*;
pub use session_store::*;
