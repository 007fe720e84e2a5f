//! Test doubles for the control surface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ibex_core::{BoxedSink, BoxedSource, Event, Response, Source, SourceError, SourceResult};
use ibex_framework::{
    AllowAll, Authorizer, Control, ControlError, ControlResult, DenyAll, Dispatcher, Processor,
    ProcessorInfo, Registry, RegistryError, Services,
};
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default)]
pub struct MockSource {
    pub connected: AtomicBool,
    pub joined: Mutex<Vec<String>>,
}

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        "test"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, _sink: BoxedSink) -> SourceResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> SourceResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(SourceError::not_connected("test"));
        }
        Ok(())
    }

    async fn join(&self, channel: &str) -> SourceResult<()> {
        self.joined.lock().push(channel.to_string());
        Ok(())
    }

    async fn send(&self, _response: &Response) -> SourceResult<()> {
        Ok(())
    }
}

/// Records every call; names containing "bad" fail.
#[derive(Default)]
pub struct MockControl {
    pub processors: Mutex<Vec<ProcessorInfo>>,
    pub config: Mutex<BTreeMap<String, Value>>,
    pub calls: Mutex<Vec<String>>,
    pub source: Arc<MockSource>,
}

impl MockControl {
    pub fn with_processors(infos: &[(&str, Option<&str>, Option<&str>)]) -> Arc<Self> {
        let control = Self::default();
        *control.processors.lock() = infos
            .iter()
            .map(|(name, feature, usage)| ProcessorInfo {
                name: name.to_string(),
                feature: feature.map(str::to_string),
                usage: usage.map(str::to_string),
            })
            .collect();
        Arc::new(control)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> ControlResult<()> {
        let failed = call.contains("bad");
        self.calls.lock().push(call);
        if failed {
            return Err(ControlError::Registry(RegistryError::UnknownProcessor("bad".to_string())));
        }
        Ok(())
    }
}

#[async_trait]
impl Control for MockControl {
    fn processors(&self) -> Vec<ProcessorInfo> {
        self.processors.lock().clone()
    }

    async fn load_processor(&self, name: &str) -> ControlResult<()> {
        self.record(format!("load {name}"))
    }

    async fn unload_processor(&self, name: &str) -> ControlResult<()> {
        self.record(format!("unload {name}"))
    }

    async fn reload_processor(&self, name: &str) -> ControlResult<()> {
        self.record(format!("reload {name}"))
    }

    async fn reload_dispatcher(&self) -> ControlResult<()> {
        self.record("reload dispatcher".to_string())
    }

    async fn reload_reloader(&self) -> ControlResult<()> {
        self.record("reload reloader".to_string())
    }

    async fn reload_auth(&self) -> ControlResult<()> {
        self.record("reload auth".to_string())
    }

    async fn reload_databases(&self) -> ControlResult<()> {
        Err(ControlError::failed("reload databases", "bad url"))
    }

    async fn reload_config(&self) -> ControlResult<()> {
        self.record("reload config".to_string())
    }

    fn config_value(&self, key: &str) -> Option<Value> {
        self.config.lock().get(key).cloned()
    }

    async fn set_config_value(&self, key: &str, value: Value) -> ControlResult<()> {
        self.record(format!("set {key}"))?;
        self.config.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn source(&self, name: &str) -> Option<BoxedSource> {
        (name == "test").then(|| Arc::clone(&self.source) as BoxedSource)
    }

    fn source_names(&self) -> Vec<String> {
        vec!["test".to_string()]
    }

    async fn connect_source(&self, name: &str) -> ControlResult<()> {
        if name != "test" {
            return Err(ControlError::UnknownSource(name.to_string()));
        }
        self.source.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect_source(&self, name: &str) -> ControlResult<()> {
        let source = self
            .source(name)
            .ok_or_else(|| ControlError::UnknownSource(name.to_string()))?;
        source.disconnect().await?;
        Ok(())
    }
}

/// Dispatches an addressed message from `#ibex` to `processor` alone and
/// returns the reply texts.
pub async fn run(processor: Processor, text: &str, control: Arc<MockControl>) -> Vec<String> {
    run_as(processor, text, control, Arc::new(AllowAll)).await
}

/// Like [`run`], but every permission check fails.
pub async fn run_denied(processor: Processor, text: &str, control: Arc<MockControl>) -> Vec<String> {
    run_as(processor, text, control, Arc::new(DenyAll)).await
}

async fn run_as(
    processor: Processor,
    text: &str,
    control: Arc<MockControl>,
    authorizer: Arc<dyn Authorizer>,
) -> Vec<String> {
    let registry = Arc::new(Registry::new());
    registry.load(processor, &Value::Null).await.unwrap();
    let event = Event::message("test", text)
        .with_sender("admin!a@localhost", "admin")
        .with_channel("#ibex")
        .addressed(true);
    let services = Services::new(authorizer).with_control(control);

    Dispatcher::new(registry)
        .dispatch(event, services)
        .await
        .responses()
        .iter()
        .map(|r| r.text.clone())
        .collect()
}
