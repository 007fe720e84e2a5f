//! Source kinds and the live source table.

use std::collections::BTreeMap;
use std::sync::Arc;

use ibex_core::{BoxedSource, SourceResult};
use ibex_framework::SourceDirectory;
use parking_lot::RwLock;
use serde_json::Value;

/// Builds a source named `name` from its configuration settings.
pub type SourceFactory = Arc<dyn Fn(&str, &Value) -> SourceResult<BoxedSource> + Send + Sync>;

/// Known source kinds, e.g. `irc`.
#[derive(Clone, Default)]
pub struct SourceCatalog {
    kinds: BTreeMap<String, SourceFactory>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str, &Value) -> SourceResult<BoxedSource> + Send + Sync + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn with<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str, &Value) -> SourceResult<BoxedSource> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    /// Builds a source of `kind`, or `None` when the kind is unknown.
    pub fn create(&self, kind: &str, name: &str, settings: &Value) -> Option<SourceResult<BoxedSource>> {
        self.kinds.get(kind).map(|factory| factory(name, settings))
    }
}

impl std::fmt::Debug for SourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCatalog")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Sources created so far, by name.
///
/// Entries survive processor, dispatcher and auth reloads; a source is only
/// replaced when its name is created again.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<BTreeMap<String, BoxedSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `source`, returning the previous one of the same name.
    pub fn insert(&self, name: impl Into<String>, source: BoxedSource) -> Option<BoxedSource> {
        self.sources.write().insert(name.into(), source)
    }

    pub fn get(&self, name: &str) -> Option<BoxedSource> {
        self.sources.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<BoxedSource> {
        self.sources.read().values().cloned().collect()
    }
}

impl SourceDirectory for SourceRegistry {
    fn source(&self, name: &str) -> Option<BoxedSource> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use ibex_core::Source;
    use serde_json::json;

    use super::*;
    use crate::testing::MockSources;

    #[test]
    fn test_catalog_create() {
        let mocks = MockSources::default();
        let catalog = SourceCatalog::new().with("mock", mocks.factory());

        assert!(catalog.contains("mock"));
        assert_eq!(catalog.kinds(), ["mock"]);
        assert!(catalog.create("irc", "libera", &Value::Null).is_none());

        let source = catalog.create("mock", "chat", &json!({})).unwrap().unwrap();
        assert_eq!(source.name(), "chat");
        assert!(!mocks.get("chat").is_connected());
    }

    #[test]
    fn test_registry_replaces_by_name() {
        let mocks = MockSources::default();
        let factory = mocks.factory();
        let registry = SourceRegistry::new();

        assert!(registry.insert("chat", factory("chat", &Value::Null).unwrap()).is_none());
        assert!(registry.insert("chat", factory("chat", &Value::Null).unwrap()).is_some());
        registry.insert("alpha", factory("alpha", &Value::Null).unwrap());

        assert_eq!(registry.names(), ["alpha", "chat"]);
        assert!(registry.source("chat").is_some());
        assert!(registry.get("nope").is_none());
    }
}
