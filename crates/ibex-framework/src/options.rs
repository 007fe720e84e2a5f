//! Declared processor options.
//!
//! A processor declares `(key, description, default)` triples. When it is
//! loaded, its section of the live configuration is merged over the declared
//! defaults; keys without a configured value or a default fail the load.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SetupError;

/// One declared option.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    key: String,
    description: String,
    default: Option<Value>,
}

impl OptionSpec {
    /// An option that falls back to `default`.
    pub fn new(key: impl Into<String>, description: impl Into<String>, default: Value) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            default: Some(default),
        }
    }

    /// An option that must be configured.
    pub fn required(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            default: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Resolved option values of a loaded processor.
///
/// Undeclared keys present in the configuration section are kept, so a
/// processor can read free-form tables of its own.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    /// Resolves `specs` against the processor's configuration `section`.
    ///
    /// `Value::Null` stands for "no section".
    pub fn resolve(processor: &str, specs: &[OptionSpec], section: &Value) -> Result<Self, SetupError> {
        let mut values = match section {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(SetupError::MalformedSection {
                    processor: processor.to_string(),
                });
            }
        };

        for spec in specs {
            if values.get(&spec.key).is_some_and(|v| !v.is_null()) {
                continue;
            }
            match &spec.default {
                Some(default) => {
                    values.insert(spec.key.clone(), default.clone());
                }
                None => {
                    return Err(SetupError::MissingOption {
                        processor: processor.to_string(),
                        key: spec.key.clone(),
                    });
                }
            }
        }

        Ok(Self { values })
    }

    /// Returns the raw value of `key`.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns `key` as a string slice.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Deserializes `key` into `T`. Returns `None` when absent or mistyped.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
