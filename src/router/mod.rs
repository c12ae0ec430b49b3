//! Message router: topic pub/sub and request/response invocation between
//! connected clients.
//!
//! Clients connect to a shared [`MessageRouter`] and receive a
//! [`RouterClient`] handle. Through it they subscribe and publish on
//! hierarchical topics, register global services or client-scoped
//! endpoints, and invoke either with exactly-once response correlation.
//! Disconnecting a client removes all of its state in one step.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

pub use config::RouterOptions;
pub use domain::{
    ClientId, CorrelationId, EndpointName, InvocationRequest, InvocationTarget, RouterError,
    RouterResult, SubscriptionId, Topic, TopicMessage,
};
pub use ports::{HandlerError, HandlerResult, ServiceHandler};
pub use services::{MessageRouter, RouterClient};

#[cfg(test)]
mod tests;
