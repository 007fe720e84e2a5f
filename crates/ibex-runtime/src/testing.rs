//! In-memory source and a preconfigured engine for tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ibex_core::{BoxedSink, BoxedSource, Event, Response, Source, SourceError, SourceResult};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::config::ConfigLoader;
use crate::runtime::{Ibex, IbexBuilder};

/// Sender granted every permission by [`loader`].
pub const ADMIN: (&str, &str) = ("admin!a@localhost", "admin");

/// A source that never leaves the process. `{ "fail": true }` in its settings
/// makes every connection attempt fail.
pub struct MockSource {
    name: String,
    fail: bool,
    connected: AtomicBool,
    sink: Mutex<Option<BoxedSink>>,
    pub sent: Mutex<Vec<Response>>,
}

impl MockSource {
    fn new(name: &str, settings: &Value) -> Self {
        Self {
            name: name.to_string(),
            fail: settings.get("fail").and_then(Value::as_bool).unwrap_or(false),
            connected: AtomicBool::new(false),
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.text.clone()).collect()
    }

    /// Feeds `text` through the sink as if a user typed it, then delivers
    /// the replies.
    pub async fn inject(&self, sender: (&str, &str), text: &str) -> Vec<String> {
        let Some(sink) = self.sink.lock().clone() else {
            return Vec::new();
        };
        let event = message(&self.name, sender, text);
        let done = sink.dispatch(event).await;
        self.deliver(&done).await;
        texts(&done)
    }
}

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, sink: BoxedSink) -> SourceResult<()> {
        if self.fail {
            return Err(SourceError::connection(&self.name, "refused"));
        }
        *self.sink.lock() = Some(sink);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> SourceResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(SourceError::not_connected(&self.name));
        }
        self.sink.lock().take();
        Ok(())
    }

    async fn send(&self, response: &Response) -> SourceResult<()> {
        self.sent.lock().push(response.clone());
        Ok(())
    }
}

/// Every [`MockSource`] created through [`MockSources::factory`], by name.
#[derive(Clone, Default)]
pub struct MockSources {
    created: Arc<Mutex<BTreeMap<String, Arc<MockSource>>>>,
}

impl MockSources {
    pub fn factory(&self) -> impl Fn(&str, &Value) -> SourceResult<BoxedSource> + Send + Sync + 'static {
        let created = Arc::clone(&self.created);
        move |name: &str, settings: &Value| {
            let source = Arc::new(MockSource::new(name, settings));
            created.lock().insert(name.to_string(), Arc::clone(&source));
            Ok(source as BoxedSource)
        }
    }

    pub fn get(&self, name: &str) -> Arc<MockSource> {
        Arc::clone(&self.created.lock()[name])
    }
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ibex-runtime-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A loader with no files or environment, one admin account, and every
/// built-in processor except `apt`.
pub fn loader(name: &str) -> ConfigLoader {
    ConfigLoader::new()
        .without_env()
        .search_path(scratch_dir(name))
        .set(
            "auth",
            json!({
                "accounts": {
                    "admin": {
                        "permissions": ["admin"],
                        "credentials": [{ "method": "hostmask", "mask": "admin!*@localhost" }]
                    }
                }
            }),
        )
        .set("plugins.noload", json!(["apt"]))
}

pub fn builder(loader: ConfigLoader) -> (IbexBuilder, MockSources) {
    let mocks = MockSources::default();
    let builder = Ibex::builder()
        .config_loader(loader)
        .processors(ibex_plugins::catalog())
        .source_kind("mock", mocks.factory());
    (builder, mocks)
}

pub fn message(source: &str, sender: (&str, &str), text: &str) -> Event {
    Event::message(source, text)
        .with_sender(sender.0, sender.1)
        .with_channel("#ibex")
        .addressed(true)
}

pub fn texts(event: &Event) -> Vec<String> {
    event.responses().iter().map(|r| r.text.clone()).collect()
}
