//! Implementation metadata reported by `getInfo`.

use crate::apps::domain::AppMetadata;
use serde::{Deserialize, Serialize};

/// FDC3 standard version implemented by the agent.
pub const FDC3_VERSION: &str = "2.0";

/// Provider name reported to applications.
pub const PROVIDER: &str = "interop-hub";

/// Provider version reported to applications.
pub const PROVIDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optional FDC3 features the agent supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalFeatures {
    /// Whether originating app metadata accompanies contexts and intents.
    pub originating_app_metadata: bool,
    /// Whether the user channel membership calls are available.
    #[serde(rename = "userChannelMembershipAPIs")]
    pub user_channel_membership_apis: bool,
}

/// Description of the agent as seen by one application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationMetadata {
    /// Implemented FDC3 version.
    pub fdc3_version: String,
    /// Provider name.
    pub provider: String,
    /// Provider version.
    pub provider_version: String,
    /// Supported optional features.
    pub optional_features: OptionalFeatures,
    /// Metadata of the calling instance.
    pub app_metadata: AppMetadata,
}

impl ImplementationMetadata {
    /// Describes this agent to the instance described by `app_metadata`.
    #[must_use]
    pub fn for_app(app_metadata: AppMetadata) -> Self {
        Self {
            fdc3_version: FDC3_VERSION.to_owned(),
            provider: PROVIDER.to_owned(),
            provider_version: PROVIDER_VERSION.to_owned(),
            optional_features: OptionalFeatures {
                originating_app_metadata: true,
                user_channel_membership_apis: true,
            },
            app_metadata,
        }
    }
}
