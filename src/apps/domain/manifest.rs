//! App Directory manifest model (FDC3 appD v2 subset).

use super::AppId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context type standing for "no context" in intent matching.
pub const CONTEXT_TYPE_NOTHING: &str = "fdc3.nothing";

/// Result-type filter matching any channel result (`channel` or `channel<T>`).
pub const RESULT_TYPE_CHANNEL: &str = "channel";

/// Image reference shown for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Image URL.
    pub src: String,
    /// Optional size hint such as `"64x64"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Optional MIME type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Screenshot of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Image URL.
    pub src: String,
    /// Optional size hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Optional MIME type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Optional caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An intent an application declares it can handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentDeclaration {
    /// Human-readable intent name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Context types the handler accepts.
    #[serde(default)]
    pub contexts: Vec<String>,
    /// Type of result the handler produces, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

impl IntentDeclaration {
    /// Returns whether the handler accepts `context_type`.
    ///
    /// No filter accepts everything. `fdc3.nothing` matches handlers that
    /// declare no contexts or list `fdc3.nothing` explicitly.
    #[must_use]
    pub fn accepts_context_type(&self, context_type: Option<&str>) -> bool {
        let Some(wanted) = context_type else {
            return true;
        };
        if wanted == CONTEXT_TYPE_NOTHING && self.contexts.is_empty() {
            return true;
        }
        self.contexts.iter().any(|declared| declared == wanted)
    }

    /// Returns whether the handler produces `result_type`.
    ///
    /// `fdc3.nothing` matches handlers without a result type; `channel`
    /// matches any channel result including typed `channel<T>` ones.
    #[must_use]
    pub fn produces_result_type(&self, result_type: Option<&str>) -> bool {
        let Some(wanted) = result_type else {
            return true;
        };
        let declared = self.result_type.as_deref();
        match wanted {
            CONTEXT_TYPE_NOTHING => declared.is_none_or(|value| value == CONTEXT_TYPE_NOTHING),
            RESULT_TYPE_CHANNEL => declared.is_some_and(|value| value.starts_with(RESULT_TYPE_CHANNEL)),
            _ => declared == Some(wanted),
        }
    }
}

/// Intents an application handles and raises.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropIntents {
    /// Intents handled, keyed by intent name.
    #[serde(default)]
    pub listens_for: BTreeMap<String, IntentDeclaration>,
    /// Intents raised, keyed by intent name, with the context types used.
    #[serde(default)]
    pub raises: BTreeMap<String, Vec<String>>,
}

/// Interop section of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interop {
    /// Declared intents.
    #[serde(default)]
    pub intents: InteropIntents,
}

/// An App Directory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fdc3App {
    /// Directory identifier.
    pub app_id: AppId,
    /// Short name.
    pub name: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tooltip text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Icons.
    #[serde(default)]
    pub icons: Vec<Icon>,
    /// Screenshots.
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
    /// Declared interop behaviour.
    #[serde(default)]
    pub interop: Interop,
}

impl Fdc3App {
    /// Creates a manifest with no declared intents.
    #[must_use]
    pub fn new(app_id: AppId, name: impl Into<String>) -> Self {
        Self {
            app_id,
            name: name.into(),
            title: None,
            version: None,
            description: None,
            tooltip: None,
            icons: Vec::new(),
            screenshots: Vec::new(),
            interop: Interop::default(),
        }
    }

    /// Declares an intent the app handles.
    #[must_use]
    pub fn listening_for(mut self, intent: impl Into<String>, declaration: IntentDeclaration) -> Self {
        self.interop
            .intents
            .listens_for
            .insert(intent.into(), declaration);
        self
    }

    /// Declares an intent the app raises with the given context types.
    #[must_use]
    pub fn raising(mut self, intent: impl Into<String>, contexts: Vec<String>) -> Self {
        self.interop.intents.raises.insert(intent.into(), contexts);
        self
    }

    /// Returns the declaration for `intent`, if the app handles it.
    #[must_use]
    pub fn listens_for(&self, intent: &str) -> Option<&IntentDeclaration> {
        self.interop.intents.listens_for.get(intent)
    }

    /// Returns whether the manifest declares raising `intent` with
    /// `context_type`.
    #[must_use]
    pub fn declares_raise(&self, intent: &str, context_type: Option<&str>) -> bool {
        self.interop
            .intents
            .raises
            .get(intent)
            .is_some_and(|contexts| {
                context_type.is_none_or(|wanted| {
                    contexts.is_empty() || contexts.iter().any(|declared| declared == wanted)
                })
            })
    }
}
