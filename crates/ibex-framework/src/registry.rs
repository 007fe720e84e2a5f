//! Processor registry and catalog.
//!
//! [`Registry`] owns the set of loaded processors. Readers take a
//! [`Snapshot`], an `Arc` of the state at that instant; writers build a new
//! state and publish it with a single pointer swap. A dispatch that took its
//! snapshot before an unload or reload keeps running against the processors
//! it saw.
//!
//! ```text
//! load(p)    ── setup(p) ok? ──► publish(state + p)
//! unload(n)  ── teardown(n)  ──► publish(state - n)
//! reload(p') ── setup(p') ok? ─► publish(state with n replaced in place) ──► teardown(old)
//! ```
//!
//! Mutations are serialised by an async mutex that dispatches never touch.
//!
//! [`ProcessorCatalog`] maps names to factories, so processors can be
//! (re)created by name at runtime.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::control::ProcessorInfo;
use crate::error::{RegistryError, RegistryResult, RuleResult};
use crate::processor::Processor;

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Default)]
struct State {
    /// Registration order.
    loaded: Vec<Arc<Processor>>,
    /// Dispatch order: by priority, then registration order.
    dispatch: Vec<Arc<Processor>>,
}

impl State {
    fn from_loaded(loaded: Vec<Arc<Processor>>) -> Self {
        let mut dispatch = loaded.clone();
        dispatch.sort_by_key(|p| p.priority());
        Self { loaded, dispatch }
    }
}

/// An immutable view of the registry at one instant.
#[derive(Clone)]
pub struct Snapshot(Arc<State>);

impl Snapshot {
    /// Processors in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Processor>> {
        self.0.dispatch.iter()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.0.loaded.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.loaded.is_empty()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// The set of loaded processors.
#[derive(Default)]
pub struct Registry {
    state: RwLock<Arc<State>>,
    mutation: AsyncMutex<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(Arc::clone(&self.state.read()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().loaded.iter().any(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Processor>> {
        self.state
            .read()
            .loaded
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().names()
    }

    pub fn infos(&self) -> Vec<ProcessorInfo> {
        self.state.read().loaded.iter().map(|p| p.info()).collect()
    }

    fn publish(&self, loaded: Vec<Arc<Processor>>) {
        *self.state.write() = Arc::new(State::from_loaded(loaded));
    }

    /// Sets `processor` up against `section` and registers it.
    pub async fn load(&self, mut processor: Processor, section: &Value) -> RegistryResult<()> {
        let _guard = self.mutation.lock().await;
        if self.contains(processor.name()) {
            return Err(RegistryError::AlreadyLoaded(processor.name().to_string()));
        }

        processor.setup(section).await?;

        let mut loaded = self.state.read().loaded.clone();
        info!(processor = %processor.name(), rules = processor.rules().len(), "Processor loaded");
        loaded.push(Arc::new(processor));
        self.publish(loaded);
        Ok(())
    }

    /// Tears `name` down and removes it.
    pub async fn unload(&self, name: &str) -> RegistryResult<()> {
        let _guard = self.mutation.lock().await;
        let Some(processor) = self.get(name) else {
            return Err(RegistryError::NotLoaded(name.to_string()));
        };

        processor.teardown().await;

        let loaded = self
            .state
            .read()
            .loaded
            .iter()
            .filter(|p| p.name() != name)
            .cloned()
            .collect();
        self.publish(loaded);
        info!(processor = %name, "Processor unloaded");
        Ok(())
    }

    /// Replaces the processor of the same name with `processor`.
    ///
    /// The replacement is set up first; if that fails the old processor stays
    /// registered untouched. On success the swap keeps the old registration
    /// position, then the old processor is torn down. A name that is not
    /// loaded is simply loaded.
    pub async fn reload(&self, mut processor: Processor, section: &Value) -> RegistryResult<()> {
        let _guard = self.mutation.lock().await;
        let name = processor.name().to_string();

        processor.setup(section).await?;
        let replacement = Arc::new(processor);

        let mut loaded = self.state.read().loaded.clone();
        let old = match loaded.iter().position(|p| p.name() == name) {
            Some(index) => Some(std::mem::replace(&mut loaded[index], replacement)),
            None => {
                warn!(processor = %name, "Reloading a processor that was not loaded");
                loaded.push(replacement);
                None
            }
        };
        self.publish(loaded);

        if let Some(old) = old {
            old.teardown().await;
        }
        info!(processor = %name, "Processor reloaded");
        Ok(())
    }

    /// Unloads everything, most recently registered first.
    pub async fn clear(&self) {
        for name in self.names().into_iter().rev() {
            if let Err(e) = self.unload(&name).await {
                warn!(processor = %name, error = %e, "Failed to unload processor");
            }
        }
    }
}

// =============================================================================
// ProcessorCatalog
// =============================================================================

/// Builds a fresh processor.
pub type ProcessorFactory = Arc<dyn Fn() -> RuleResult<Processor> + Send + Sync>;

/// Known processors by name, in declaration order.
#[derive(Clone, Default)]
pub struct ProcessorCatalog {
    entries: Vec<(String, ProcessorFactory)>,
}

impl ProcessorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing an earlier entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> RuleResult<Processor> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: ProcessorFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> RuleResult<Processor> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Appends every entry of `other`.
    pub fn extend(&mut self, other: ProcessorCatalog) -> &mut Self {
        for (name, factory) in other.entries {
            match self.entries.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = factory,
                None => self.entries.push((name, factory)),
            }
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Builds a new instance of `name`.
    pub fn create(&self, name: &str) -> RegistryResult<Processor> {
        let (_, factory) = self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| RegistryError::UnknownProcessor(name.to_string()))?;
        let processor = factory().map_err(|e| RegistryError::build(name, e))?;
        if processor.name() != name {
            return Err(RegistryError::NameMismatch {
                expected: name.to_string(),
                actual: processor.name().to_string(),
            });
        }
        Ok(processor)
    }

    /// Catalog names whose processor or feature appears in neither list of
    /// exclusions, restricted to `only` when it is non-empty.
    pub fn select(&self, only: &[String], exclude: &[String]) -> Vec<String> {
        let only: HashSet<&str> = only.iter().map(String::as_str).collect();
        let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        self.entries
            .iter()
            .filter(|(name, factory)| {
                if !only.is_empty() && !only.contains(name.as_str()) {
                    return false;
                }
                if exclude.contains(name.as_str()) {
                    return false;
                }
                match factory() {
                    Ok(p) => p.feature().is_none_or(|f| !exclude.contains(f)),
                    Err(_) => true,
                }
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::SetupError;
    use crate::processor::SetupContext;

    fn plain(name: &str) -> Processor {
        Processor::builder(name).build().unwrap()
    }

    #[tokio::test]
    async fn test_load_unload() {
        let registry = Registry::new();
        registry.load(plain("a"), &Value::Null).await.unwrap();
        registry.load(plain("b"), &Value::Null).await.unwrap();
        assert_eq!(registry.names(), ["a", "b"]);

        let dup = registry.load(plain("a"), &Value::Null).await;
        assert!(matches!(dup, Err(RegistryError::AlreadyLoaded(_))));

        registry.unload("a").await.unwrap();
        assert_eq!(registry.names(), ["b"]);
    }

    #[tokio::test]
    async fn test_unload_unknown_leaves_registry_unchanged() {
        let registry = Registry::new();
        registry.load(plain("a"), &Value::Null).await.unwrap();

        let result = registry.unload("badname").await;
        assert!(matches!(result, Err(RegistryError::NotLoaded(_))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_setup_is_not_registered() {
        let registry = Registry::new();
        let p = Processor::builder("weather")
            .required_option("token", "api token")
            .build()
            .unwrap();

        let err = registry.load(p, &json!({})).await.unwrap_err();
        assert!(matches!(err, RegistryError::Setup(SetupError::MissingOption { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_old() {
        let registry = Registry::new();
        let torn_down = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&torn_down);
        let p = Processor::builder("a")
            .teardown(move || {
                let t = Arc::clone(&t);
                async move {
                    t.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();
        registry.load(p, &Value::Null).await.unwrap();
        registry.load(plain("b"), &Value::Null).await.unwrap();

        let broken = Processor::builder("a")
            .setup(|_: SetupContext| async { Err::<(), _>("nope") })
            .build()
            .unwrap();
        assert!(registry.reload(broken, &Value::Null).await.is_err());
        assert_eq!(torn_down.load(Ordering::SeqCst), 0);

        registry.reload(plain("a"), &Value::Null).await.unwrap();
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(registry.names(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_mutation() {
        let registry = Registry::new();
        registry.load(plain("a"), &Value::Null).await.unwrap();

        let before = registry.snapshot();
        registry.unload("a").await.unwrap();

        assert_eq!(before.names(), ["a"]);
        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_priority_orders_dispatch_not_registration() {
        let registry = Registry::new();
        registry.load(plain("a"), &Value::Null).await.unwrap();
        let early = Processor::builder("early").priority(-10).build().unwrap();
        registry.load(early, &Value::Null).await.unwrap();
        registry.load(plain("c"), &Value::Null).await.unwrap();

        let snapshot = registry.snapshot();
        let order: Vec<_> = snapshot.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(order, ["early", "a", "c"]);
        assert_eq!(snapshot.names(), ["a", "early", "c"]);
    }

    #[test]
    fn test_catalog() {
        let catalog = ProcessorCatalog::new()
            .with("a", || Processor::builder("a").feature("misc").build())
            .with("b", || Processor::builder("b").build())
            .with("liar", || Processor::builder("other").build());

        assert!(catalog.create("a").is_ok());
        assert!(matches!(catalog.create("zzz"), Err(RegistryError::UnknownProcessor(_))));
        assert!(matches!(catalog.create("liar"), Err(RegistryError::NameMismatch { .. })));

        assert_eq!(catalog.select(&[], &["misc".into()]), ["b", "liar"]);
        assert_eq!(catalog.select(&["a".into()], &[]), ["a"]);
    }
}
