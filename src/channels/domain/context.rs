//! Typed context payloads.

use super::ChannelDomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON object carrying a non-empty string `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Context {
    context_type: String,
    value: Value,
}

impl Context {
    /// Validates a raw JSON value as a context.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelDomainError::MalformedContext`] unless `value` is an
    /// object whose `type` is a non-empty string.
    pub fn new(value: Value) -> Result<Self, ChannelDomainError> {
        let context_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|context_type| !context_type.is_empty())
            .ok_or_else(|| {
                ChannelDomainError::MalformedContext(
                    "context must be an object with a non-empty string 'type'".to_owned(),
                )
            })?
            .to_owned();
        Ok(Self {
            context_type,
            value,
        })
    }

    /// Returns the context type, for example `fdc3.instrument`.
    #[must_use]
    pub fn context_type(&self) -> &str {
        &self.context_type
    }

    /// Returns the full JSON payload.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Returns whether the context passes an optional type filter.
    #[must_use]
    pub fn matches_type(&self, filter: Option<&str>) -> bool {
        filter.is_none_or(|wanted| wanted == self.context_type)
    }
}

impl TryFrom<Value> for Context {
    type Error = ChannelDomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Context> for Value {
    fn from(context: Context) -> Self {
        context.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn context_exposes_its_type() {
        let context = Context::new(json!({ "type": "fdc3.instrument", "id": { "ticker": "AAPL" } }))
            .expect("valid context");

        assert_eq!(context.context_type(), "fdc3.instrument");
        assert!(context.matches_type(None));
        assert!(context.matches_type(Some("fdc3.instrument")));
        assert!(!context.matches_type(Some("fdc3.contact")));
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!("fdc3.instrument"))]
    #[case(json!({ "id": 1 }))]
    #[case(json!({ "type": "" }))]
    #[case(json!({ "type": 7 }))]
    fn malformed_contexts_are_rejected(#[case] value: Value) {
        assert!(matches!(
            Context::new(value),
            Err(ChannelDomainError::MalformedContext(_))
        ));
    }
}
