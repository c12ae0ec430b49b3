//! Application model and the external collaborators the brokers consult.
//!
//! - Domain types in [`domain`]: manifests, identifiers and lifecycle
//! - Port contracts in [`ports`]: App Directory, Module Loader, Resolver UI
//! - Adapter implementations in [`adapters`]
//! - Instance tracking in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
