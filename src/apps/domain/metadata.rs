//! Wire-facing descriptions of applications and intents.

use super::{AppId, Fdc3App, Icon, InstanceId, Screenshot};
use serde::{Deserialize, Serialize};

/// Identifies an application and optionally one of its running instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentifier {
    /// Directory identifier.
    pub app_id: AppId,
    /// Running instance, when addressing one specifically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
}

impl AppIdentifier {
    /// Identifies an application without an instance.
    #[must_use]
    pub const fn app(app_id: AppId) -> Self {
        Self {
            app_id,
            instance_id: None,
        }
    }

    /// Identifies a specific running instance.
    #[must_use]
    pub const fn instance(app_id: AppId, instance_id: InstanceId) -> Self {
        Self {
            app_id,
            instance_id: Some(instance_id),
        }
    }
}

/// Descriptive metadata about an application or one of its instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    /// Directory identifier.
    pub app_id: AppId,
    /// Running instance this metadata describes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    /// Short name.
    pub name: String,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tooltip text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Icons.
    #[serde(default)]
    pub icons: Vec<Icon>,
    /// Screenshots.
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
    /// Result type produced for the intent this metadata was matched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

impl AppMetadata {
    /// Builds metadata from a manifest.
    #[must_use]
    pub fn from_app(app: &Fdc3App, instance_id: Option<InstanceId>, result_type: Option<String>) -> Self {
        Self {
            app_id: app.app_id.clone(),
            instance_id,
            name: app.name.clone(),
            version: app.version.clone(),
            title: app.title.clone(),
            tooltip: app.tooltip.clone(),
            description: app.description.clone(),
            icons: app.icons.clone(),
            screenshots: app.screenshots.clone(),
            result_type,
        }
    }

    /// Returns the identifier of the described app or instance.
    #[must_use]
    pub fn identifier(&self) -> AppIdentifier {
        AppIdentifier {
            app_id: self.app_id.clone(),
            instance_id: self.instance_id,
        }
    }
}

/// Name and display name of an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentMetadata {
    /// Intent name.
    pub name: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An intent together with the apps and instances able to handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIntent {
    /// The intent.
    pub intent: IntentMetadata,
    /// Matching apps (no instance id) and running instances.
    pub apps: Vec<AppMetadata>,
}
