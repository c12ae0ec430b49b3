//! Application lifecycle services.

pub mod launcher;
pub mod registry;

pub use launcher::{AppLaunchError, AppLaunchResult, AppLauncher};
pub use registry::{InstanceRegistry, InstanceRegistryError, InstanceRegistryResult, StartOutcome};
