//! Adapter implementations for the message router ports.

pub mod closure;

pub use closure::{FnHandler, handler_fn};
