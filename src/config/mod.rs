mod agent;

pub use agent::AgentConfig;
pub use crate::access::PrivateAccess;
