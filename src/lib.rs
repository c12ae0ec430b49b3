//! Interop hub: an FDC3 2.0 desktop agent built on an in-process message
//! router.
//!
//! Apps connect to the [`router::MessageRouter`] and talk to the
//! [`agent::DesktopAgent`] through the services registered by
//! [`agent::DesktopAgentRouterService`]. The agent coordinates app
//! launching, context sharing over channels, and intent resolution.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture principles:
//!
//! - **Domain**: Values and invariants with no infrastructure dependencies
//! - **Ports**: Trait interfaces for collaborators such as the App Directory
//! - **Adapters**: Concrete implementations of ports (in-memory, JSON files)
//! - **Services**: Orchestration over domain types and ports
//!
//! # Modules
//!
//! - [`router`]: Topic pub/sub and request/response invocation
//! - [`apps`]: App Directory, launching, and running-instance tracking
//! - [`channels`]: User, app, and private channels with context listeners
//! - [`intents`]: Intent discovery, resolution, delivery, and results
//! - [`agent`]: The desktop agent façade and its wire protocol

pub mod agent;
pub mod apps;
pub mod channels;
pub mod intents;
pub mod router;

mod fs_utils;
mod serde_millis;
