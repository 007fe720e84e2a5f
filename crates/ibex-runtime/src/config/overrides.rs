//! Run-time configuration overrides addressed by dotted keys.

use figment::Figment;
use figment::providers::Serialized;
use serde_json::Value;

use super::error::{ConfigError, ConfigResult};

/// Keys set while running, applied on top of every configuration layer.
///
/// Later sets of the same key replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: Vec<(String, Value)>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` (e.g. `dispatcher.handler_timeout_secs`) to `value`.
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<()> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn apply(&self, mut figment: Figment) -> Figment {
        for (key, value) in &self.entries {
            figment = figment.merge(Serialized::default(key, value.clone()));
        }
        figment
    }
}

/// Placeholder shown instead of secret values.
pub const REDACTED: &str = "<redacted>";

/// Keys whose values are secret wherever they appear.
const SECRET_KEYS: &[&str] = &["password", "secret", "token", "api_key"];

/// Hides credentials before a configuration tree is shown to anyone: the
/// authorization accounts and every value stored under a secret key.
pub fn redact(root: &mut Value) {
    if let Some(accounts) = root.pointer_mut("/auth/accounts") {
        *accounts = Value::String(REDACTED.to_string());
    }
    redact_secrets(root);
}

fn redact_secrets(node: &mut Value) {
    match node {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if SECRET_KEYS.iter().any(|s| key.eq_ignore_ascii_case(s)) && !value.is_null() {
                    *value = Value::String(REDACTED.to_string());
                } else {
                    redact_secrets(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// Resolves a dotted key inside a JSON tree.
pub fn lookup(root: &Value, key: &str) -> Option<Value> {
    key.split('.')
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .cloned()
}
