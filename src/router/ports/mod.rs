//! Port definitions for the message router.

pub mod handler;

pub use handler::{HandlerError, HandlerResult, ServiceHandler};
