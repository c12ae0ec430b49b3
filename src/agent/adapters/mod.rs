//! Transport adapters for the desktop agent.

pub mod router_service;

pub use router_service::DesktopAgentRouterService;
