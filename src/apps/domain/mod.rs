//! Domain model shared by the brokers: manifests, identifiers and instance
//! lifecycle.

mod error;
mod ids;
mod lifecycle;
mod manifest;
mod metadata;

pub use error::{AppDomainError, ParseInstanceLifecycleError};
pub use ids::{AppId, InstanceId};
pub use lifecycle::{
    AppInstance, InstanceLifecycle, LifetimeEvent, LifetimeEventKind, ModuleInstance,
};
pub use manifest::{
    CONTEXT_TYPE_NOTHING, Fdc3App, Icon, IntentDeclaration, Interop, InteropIntents,
    RESULT_TYPE_CHANNEL, Screenshot,
};
pub use metadata::{AppIdentifier, AppIntent, AppMetadata, IntentMetadata};

/// Root of every FDC3 topic and service name on the router.
pub const FDC3_TOPIC_ROOT: &str = "interop/fdc3/v2.0";

/// Startup parameter carrying the FDC3 instance id assigned to a new module.
pub const STARTUP_PARAM_INSTANCE_ID: &str = "Fdc3InstanceId";

/// Startup parameter carrying the id of a context stashed by `Open`.
pub const STARTUP_PARAM_OPENED_CONTEXT_ID: &str = "OpenedAppContextId";
