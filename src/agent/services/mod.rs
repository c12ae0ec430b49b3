//! Desktop agent services.

pub mod desktop_agent;

pub use desktop_agent::{AgentError, AgentResult, DesktopAgent, OpenError, OpenResult};
