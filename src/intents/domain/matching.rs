//! Matching directory apps and running instances against intents.

use crate::apps::domain::{AppInstance, AppIntent, AppMetadata, Fdc3App, IntentMetadata};
use std::collections::BTreeMap;

/// Filters applied when matching intents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentQuery<'a> {
    /// Only this intent; `None` matches every intent.
    pub intent: Option<&'a str>,
    /// Context type the handler must accept.
    pub context_type: Option<&'a str>,
    /// Result type the handler must produce.
    pub result_type: Option<&'a str>,
}

/// Groups the apps and running instances able to handle each matching
/// intent, ordered by intent name.
///
/// Each app appears once without an instance id, followed by its running
/// instances.
#[must_use]
pub fn app_intents(apps: &[Fdc3App], running: &[AppInstance], query: IntentQuery<'_>) -> Vec<AppIntent> {
    let mut grouped: BTreeMap<&str, AppIntent> = BTreeMap::new();
    for app in apps {
        for (intent, declaration) in &app.interop.intents.listens_for {
            if query.intent.is_some_and(|wanted| wanted != intent)
                || !declaration.accepts_context_type(query.context_type)
                || !declaration.produces_result_type(query.result_type)
            {
                continue;
            }
            let entry = grouped.entry(intent.as_str()).or_insert_with(|| AppIntent {
                intent: IntentMetadata {
                    name: intent.clone(),
                    display_name: None,
                },
                apps: Vec::new(),
            });
            if entry.intent.display_name.is_none() {
                entry.intent.display_name.clone_from(&declaration.display_name);
            }
            entry
                .apps
                .push(AppMetadata::from_app(app, None, declaration.result_type.clone()));
            entry.apps.extend(
                running
                    .iter()
                    .filter(|instance| instance.app_id() == &app.app_id)
                    .map(|instance| {
                        AppMetadata::from_app(
                            app,
                            Some(instance.instance_id()),
                            declaration.result_type.clone(),
                        )
                    }),
            );
        }
    }
    grouped.into_values().collect()
}
