//! Desktop agent: the FDC3 façade apps talk to.
//!
//! [`DesktopAgent`] wires the instance registry, launcher, channel broker
//! and intent broker together, adds `open`, `getInfo` and the app metadata
//! queries, and releases broker state when instances stop.
//! [`DesktopAgentRouterService`] exposes every [`Fdc3Operation`] as a
//! router service under `interop/fdc3/v2.0/`.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod protocol;
pub mod services;

pub use adapters::DesktopAgentRouterService;
pub use config::{ConfigError, ConfigResult, DesktopAgentOptions};
pub use domain::{ImplementationMetadata, OpenedContextId};
pub use protocol::{ErrorCode, Fdc3Operation, Fdc3Response, context_listener_topic};
pub use services::{AgentError, AgentResult, DesktopAgent, OpenError, OpenResult};

#[cfg(test)]
mod tests;
