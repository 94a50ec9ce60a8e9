//! Identity records attached to whitelist entries.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Open attribute map describing an authenticated principal.
///
/// Conventionally carries `id`, and `token` when token validation is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Map<String, Value>);

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template merged into matched identities unless configured otherwise.
    pub fn default_template() -> Self {
        let mut attrs = Map::new();
        attrs.insert("id".into(), json!(-1));
        attrs.insert("admin".into(), json!(false));
        attrs.insert("scope".into(), json!([]));
        attrs.insert("token".into(), Value::Null);
        Self(attrs)
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn id(&self) -> Option<&Value> {
        self.get("id")
    }

    pub fn token(&self) -> Option<&Value> {
        self.get("token")
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Copy every attribute of `defaults` that is not already set here.
    ///
    /// An attribute explicitly set to `null` counts as set.
    pub fn merge_defaults(&mut self, defaults: &Identity) {
        for (key, value) in &defaults.0 {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

impl From<Map<String, Value>> for Identity {
    fn from(attrs: Map<String, Value>) -> Self {
        Self(attrs)
    }
}

/// Loose truthiness of a configuration or request value.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Recursively fill keys missing from `target` with the ones from `defaults`.
///
/// Nested objects present on both sides are merged; everything else already on `target` wins.
pub(crate) fn defaults_deep(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default.clone());
            }
            Some(Value::Object(nested)) => {
                if let Value::Object(default_nested) = default {
                    defaults_deep(nested, default_nested);
                }
            }
            Some(_) => {}
        }
    }
}
