//! Router services.

pub mod client;
pub mod registry;
pub mod router;

pub use client::RouterClient;
pub use registry::{ConnectionRegistry, RemovedClient};
pub use router::MessageRouter;
