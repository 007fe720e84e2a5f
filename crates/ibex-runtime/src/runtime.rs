//! The application context.
//!
//! [`Ibex`] owns everything that lives for the whole process: the
//! configuration, the processor registry, the source table, and the current
//! dispatcher, reloader, authorizer and database pools. The last four sit
//! behind `RwLock<Arc<_>>` so they can be swapped while events are in flight;
//! readers clone the `Arc` and never hold a lock across an await.
//!
//! ```rust,ignore
//! use ibex_runtime::Ibex;
//!
//! let ibex = Ibex::builder()
//!     .config_file("ibex.toml")
//!     .processors(ibex_plugins::catalog())
//!     .source_kind("irc", irc_factory)
//!     .build()?;
//! ibex.run().await?;
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ibex_core::{BoxedSink, BoxedSource, Event, EventSink, SourceResult};
use ibex_framework::{
    Authorizer, Control, ControlResult, DenyAll, Dispatcher, Processor, ProcessorCatalog,
    ProcessorInfo, Registry, RuleResult, Services,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{ConfigError, ConfigLoader, IbexConfig, Overrides, lookup, redact};
use crate::databases::Databases;
use crate::error::{RuntimeError, RuntimeResult};
use crate::reloader::Reloader;
use crate::sources::{SourceCatalog, SourceRegistry};

/// The running engine.
pub struct Ibex {
    me: Weak<Ibex>,
    loader: ConfigLoader,
    config: RwLock<Arc<IbexConfig>>,
    overrides: Mutex<Overrides>,
    registry: Arc<Registry>,
    sources: Arc<SourceRegistry>,
    dispatcher: RwLock<Arc<Dispatcher>>,
    reloader: RwLock<Arc<Reloader>>,
    authorizer: RwLock<Arc<dyn Authorizer>>,
    databases: RwLock<Arc<Databases>>,
    running: AtomicBool,
}

impl Ibex {
    pub fn builder() -> IbexBuilder {
        IbexBuilder::new()
    }

    pub fn config(&self) -> Arc<IbexConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher.read())
    }

    pub fn reloader(&self) -> Arc<Reloader> {
        Arc::clone(&self.reloader.read())
    }

    pub fn authorizer(&self) -> Arc<dyn Authorizer> {
        Arc::clone(&self.authorizer.read())
    }

    pub fn databases(&self) -> Arc<Databases> {
        Arc::clone(&self.databases.read())
    }

    /// A handle to database pool `name`.
    pub fn database(&self, name: &str) -> Option<sqlx::SqlitePool> {
        self.databases.read().get(name)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_dispatcher(&self, dispatcher: Arc<Dispatcher>) {
        *self.dispatcher.write() = dispatcher;
    }

    pub(crate) fn set_authorizer(&self, authorizer: Arc<dyn Authorizer>) {
        *self.authorizer.write() = authorizer;
    }

    pub(crate) fn set_databases(&self, databases: Arc<Databases>) {
        *self.databases.write() = databases;
    }

    fn handle(&self) -> RuntimeResult<Arc<Ibex>> {
        self.me.upgrade().ok_or(RuntimeError::Stopped)
    }

    /// This context as the sink sources deliver events to.
    pub fn sink(&self) -> RuntimeResult<BoxedSink> {
        Ok(self.handle()? as BoxedSink)
    }

    /// Services handed to one dispatch: the current authorizer, plus this
    /// context as the control surface.
    fn services(&self) -> Services {
        let services = Services::new(self.authorizer());
        match self.handle() {
            Ok(me) => services.with_control(me),
            Err(_) => services,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Re-reads files and environment, re-applying run-time overrides.
    pub fn reload_config(&self) -> RuntimeResult<()> {
        let overrides = self.overrides.lock().clone();
        let config = self.loader.load_with(&overrides)?;
        *self.config.write() = Arc::new(config);
        info!("Configuration reloaded");
        Ok(())
    }

    /// Looks up a dotted key in the live configuration, with credentials
    /// redacted.
    pub fn config_value(&self, key: &str) -> Option<Value> {
        let mut tree = serde_json::to_value(&*self.config()).ok()?;
        redact(&mut tree);
        lookup(&tree, key)
    }

    /// Overrides a dotted key. The new configuration must still load, and
    /// the key must name a value afterwards; otherwise nothing changes.
    pub fn set_config_value(&self, key: &str, value: Value) -> RuntimeResult<()> {
        let mut overrides = self.overrides.lock().clone();
        overrides.set(key, value)?;
        let config = self.loader.load_with(&overrides)?;
        let tree = serde_json::to_value(&config)
            .map_err(|e| ConfigError::Extract(e.to_string()))?;
        if lookup(&tree, key).is_none() {
            return Err(ConfigError::InvalidKey(key.to_string()).into());
        }

        *self.overrides.lock() = overrides;
        *self.config.write() = Arc::new(config);
        info!(key = %key, "Configuration value set");
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Brings the engine up: dispatcher, databases, authorization,
    /// processors, then sources.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Ibex is already running");
            return Ok(());
        }
        info!(botname = %self.config().botname, "Starting Ibex");

        let reloader = self.reloader();
        reloader.reload_dispatcher(self);
        reloader.reload_databases(self)?;
        reloader.reload_auth(self)?;

        let processors = reloader.load_processors(self).await;
        for (name, reason) in &processors.failed {
            error!(processor = %name, reason = %reason, "Processor failed to load");
        }
        let sources = reloader.load_sources(self).await;
        for (name, reason) in &sources.failed {
            error!(source = %name, reason = %reason, "Source failed to start");
        }

        info!(
            processors = processors.loaded.len(),
            sources = sources.loaded.len(),
            "Ibex started"
        );
        Ok(())
    }

    /// Disconnects sources, unloads processors newest first, and closes the
    /// database pools.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Ibex is not running");
            return Ok(());
        }
        info!("Stopping Ibex");

        for source in self.sources.all() {
            if source.is_connected()
                && let Err(e) = source.disconnect().await
            {
                error!(source = %source.name(), error = %e, "Error while disconnecting source");
            }
        }
        self.registry.clear().await;
        self.databases().close().await;

        info!("Ibex stopped");
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Ibex is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    fn source_or_unknown(&self, name: &str) -> RuntimeResult<BoxedSource> {
        self.sources
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownSource(name.to_string()))
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

#[async_trait]
impl EventSink for Ibex {
    async fn dispatch(&self, event: Event) -> Event {
        let dispatcher = self.dispatcher();
        dispatcher.dispatch(event, self.services()).await
    }
}

#[async_trait]
impl Control for Ibex {
    fn processors(&self) -> Vec<ProcessorInfo> {
        self.registry.infos()
    }

    async fn load_processor(&self, name: &str) -> ControlResult<()> {
        self.reloader()
            .load_processor(self, name)
            .await
            .map_err(|e| e.into_control("load processor"))
    }

    async fn unload_processor(&self, name: &str) -> ControlResult<()> {
        self.reloader()
            .unload_processor(self, name)
            .await
            .map_err(|e| e.into_control("unload processor"))
    }

    async fn reload_processor(&self, name: &str) -> ControlResult<()> {
        self.reloader()
            .reload_processor(self, name)
            .await
            .map_err(|e| e.into_control("reload processor"))
    }

    async fn reload_dispatcher(&self) -> ControlResult<()> {
        self.reloader().reload_dispatcher(self);
        Ok(())
    }

    async fn reload_reloader(&self) -> ControlResult<()> {
        let rebuilt = self.reloader().rebuilt();
        let generation = rebuilt.generation();
        *self.reloader.write() = Arc::new(rebuilt);
        info!(generation, "Reloader reloaded");
        Ok(())
    }

    async fn reload_auth(&self) -> ControlResult<()> {
        self.reloader()
            .reload_auth(self)
            .map_err(|e| e.into_control("reload auth"))
    }

    async fn reload_databases(&self) -> ControlResult<()> {
        self.reloader()
            .reload_databases(self)
            .map_err(|e| e.into_control("reload databases"))
    }

    async fn reload_config(&self) -> ControlResult<()> {
        Ibex::reload_config(self).map_err(|e| e.into_control("reload config"))
    }

    fn config_value(&self, key: &str) -> Option<Value> {
        Ibex::config_value(self, key)
    }

    async fn set_config_value(&self, key: &str, value: Value) -> ControlResult<()> {
        Ibex::set_config_value(self, key, value).map_err(|e| e.into_control("set config"))
    }

    fn source(&self, name: &str) -> Option<BoxedSource> {
        self.sources.get(name)
    }

    fn source_names(&self) -> Vec<String> {
        self.sources.names()
    }

    async fn connect_source(&self, name: &str) -> ControlResult<()> {
        let connect = async {
            let source = self.source_or_unknown(name)?;
            source.connect(self.sink()?).await?;
            Ok::<_, RuntimeError>(())
        };
        connect.await.map_err(|e| e.into_control("connect"))
    }

    async fn disconnect_source(&self, name: &str) -> ControlResult<()> {
        let disconnect = async {
            let source = self.source_or_unknown(name)?;
            source.disconnect().await?;
            Ok::<_, RuntimeError>(())
        };
        disconnect.await.map_err(|e| e.into_control("disconnect"))
    }
}

// =============================================================================
// IbexBuilder
// =============================================================================

/// Builder for [`Ibex`].
pub struct IbexBuilder {
    loader: ConfigLoader,
    processors: ProcessorCatalog,
    sources: SourceCatalog,
}

impl IbexBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            processors: ProcessorCatalog::new(),
            sources: SourceCatalog::new(),
        }
    }

    /// Replaces the configuration loader.
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Adds every processor of `catalog`.
    pub fn processors(mut self, catalog: ProcessorCatalog) -> Self {
        self.processors.extend(catalog);
        self
    }

    pub fn processor<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> RuleResult<Processor> + Send + Sync + 'static,
    {
        self.processors.register(name, factory);
        self
    }

    /// Registers a source kind, e.g. `irc`.
    pub fn source_kind<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str, &Value) -> SourceResult<BoxedSource> + Send + Sync + 'static,
    {
        self.sources.register(kind, factory);
        self
    }

    /// Loads the configuration and assembles the context. Nothing is
    /// started until [`Ibex::start`].
    pub fn build(self) -> RuntimeResult<Arc<Ibex>> {
        let config = self.loader.load()?;
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        let reloader = Reloader::new(self.processors, self.sources);

        Ok(Arc::new_cyclic(|me| Ibex {
            me: me.clone(),
            loader: self.loader,
            config: RwLock::new(Arc::new(config)),
            overrides: Mutex::new(Overrides::new()),
            registry,
            sources: Arc::new(SourceRegistry::new()),
            dispatcher: RwLock::new(Arc::new(dispatcher)),
            reloader: RwLock::new(Arc::new(reloader)),
            authorizer: RwLock::new(Arc::new(DenyAll)),
            databases: RwLock::new(Arc::new(Databases::empty())),
            running: AtomicBool::new(false),
        }))
    }
}

impl Default for IbexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use ibex_core::Source;
    use ibex_framework::{Captures, HandlerContext, on_pattern};
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::testing::{ADMIN, builder, loader, message, texts};

    const EVE: (&str, &str) = ("eve!e@elsewhere", "eve");

    async fn say(ibex: &Ibex, sender: (&str, &str), text: &str) -> Vec<String> {
        texts(&ibex.dispatch(message("chat", sender, text)).await)
    }

    async fn started(name: &str) -> Arc<Ibex> {
        let (builder, _) = builder(loader(name));
        let ibex = builder.build().unwrap();
        ibex.start().await.unwrap();
        ibex
    }

    #[tokio::test]
    async fn test_start_loads_selected_processors() {
        let ibex = started("start").await;

        assert!(ibex.is_running());
        assert_eq!(
            ibex.registry().names(),
            ["admin", "config", "sources", "help", "crypto", "morse"]
        );
        assert_eq!(
            say(&ibex, ADMIN, "list plugins").await,
            ["admin, config, sources, help, crypto, morse"]
        );

        // Starting twice changes nothing.
        ibex.start().await.unwrap();
        assert_eq!(ibex.registry().names().len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_reported() {
        let ibex = started("unknown-plugin").await;

        assert_eq!(say(&ibex, ADMIN, "unload badname plugin").await, ["Couldn't unload badname"]);
        assert_eq!(say(&ibex, ADMIN, "load badname plugin").await, ["Couldn't load badname"]);
        assert_eq!(ibex.registry().names().len(), 6);
    }

    #[tokio::test]
    async fn test_unload_and_load_plugin() {
        let ibex = started("unload").await;

        assert_eq!(say(&ibex, ADMIN, "unload morse plugin").await, ["Unloaded morse"]);
        assert!(say(&ibex, ADMIN, "morse sos").await.is_empty());
        assert_eq!(say(&ibex, ADMIN, "load morse plugin").await, ["Loaded morse"]);
        assert_eq!(say(&ibex, ADMIN, "morse sos").await, ["... --- ..."]);
    }

    #[tokio::test]
    async fn test_unauthorised_sender_gets_nothing() {
        let ibex = started("denied").await;

        assert!(say(&ibex, EVE, "unload help plugin").await.is_empty());
        assert!(ibex.registry().contains("help"));
        // Commands without a permission still answer.
        assert_eq!(say(&ibex, EVE, "rot13 ibex").await, ["vork"]);
    }

    #[tokio::test]
    async fn test_reload_while_dispatch_in_flight() {
        let generation = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let (g, e, r) = (Arc::clone(&generation), Arc::clone(&entered), Arc::clone(&release));
        let (builder, _) = builder(loader("in-flight"));
        let ibex = builder
            .processor("gate", move || {
                let n = g.fetch_add(1, Ordering::SeqCst) + 1;
                let (e, r) = (Arc::clone(&e), Arc::clone(&r));
                Processor::builder("gate")
                    .rule(on_pattern("^slow$").handler(move |ctx: Arc<HandlerContext>, _: Captures| {
                        let (e, r) = (Arc::clone(&e), Arc::clone(&r));
                        async move {
                            e.notify_one();
                            r.notified().await;
                            ctx.add_response(format!("gate {n}"));
                        }
                    }))
                    .rule(on_pattern("^which$").handler(move |ctx: Arc<HandlerContext>, _: Captures| async move {
                        ctx.add_response(format!("gate {n}"));
                    }))
                    .build()
            })
            .build()
            .unwrap();
        ibex.start().await.unwrap();
        let loaded = generation.load(Ordering::SeqCst);

        let sink = ibex.sink().unwrap();
        let in_flight = tokio::spawn(async move { sink.dispatch(message("chat", ADMIN, "slow")).await });
        entered.notified().await;

        assert_eq!(say(&ibex, ADMIN, "reload gate plugin").await, ["Reloaded gate"]);
        release.notify_one();

        assert_eq!(texts(&in_flight.await.unwrap()), [format!("gate {loaded}")]);
        assert_eq!(say(&ibex, ADMIN, "which").await, [format!("gate {}", loaded + 1)]);
    }

    #[tokio::test]
    async fn test_set_and_get_config() {
        let ibex = started("set-config").await;

        assert_eq!(
            say(&ibex, ADMIN, "set config dispatcher.handler_timeout_secs to 30").await,
            ["Done"]
        );
        assert_eq!(say(&ibex, EVE, "get config dispatcher.handler_timeout_secs").await, ["30"]);
        assert_eq!(say(&ibex, ADMIN, "set config no.such.key to 1").await, ["Couldn't set no.such.key"]);
        assert_eq!(say(&ibex, ADMIN, "get config no.such.key").await, ["No such option"]);

        // Overrides survive a reload.
        assert_eq!(say(&ibex, ADMIN, "reload config").await, ["Configuration reloaded"]);
        assert_eq!(ibex.config().dispatcher.handler_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_get_config_hides_credentials() {
        let config = loader("secrets").set(
            "sources",
            json!({ "chat": { "type": "mock", "autoconnect": false, "password": "hunter2" } }),
        );
        let (builder, _) = builder(config);
        let ibex = builder.build().unwrap();
        ibex.start().await.unwrap();

        assert_eq!(say(&ibex, EVE, "get config sources.chat.password").await, ["<redacted>"]);
        assert_eq!(say(&ibex, EVE, "get config auth.accounts").await, ["<redacted>"]);
        assert_eq!(say(&ibex, EVE, "get config auth.accounts.admin").await, ["No such option"]);
        let chat = say(&ibex, EVE, "get config sources.chat").await;
        assert!(!chat[0].contains("hunter2"));
        assert_eq!(say(&ibex, EVE, "get config auth.timeout_secs").await, ["15"]);

        // The live configuration itself is untouched.
        assert_eq!(ibex.config().sources["chat"].settings_value()["password"], json!("hunter2"));
        assert_eq!(ibex.config().auth.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_processor_does_not_block_others() {
        let (builder, _) = builder(loader("bad-processor"));
        let ibex = builder
            .processor("broken", || {
                Processor::builder("broken")
                    .required_option("token", "api token")
                    .build()
            })
            .build()
            .unwrap();

        let report = ibex.reloader().load_processors(&ibex).await;

        assert_eq!(report.loaded, ["admin", "config", "sources", "help", "crypto", "morse"]);
        assert_eq!(
            report.failed,
            [(
                "broken".to_string(),
                "processor 'broken' requires option 'token'".to_string()
            )]
        );
        assert!(!ibex.registry().contains("broken"));
        assert_eq!(say(&ibex, ADMIN, "morse sos").await, ["... --- ..."]);
    }

    #[tokio::test]
    async fn test_bad_source_does_not_block_others() {
        let config = loader("bad-source").set(
            "sources",
            json!({
                "chat": { "type": "mock" },
                "flaky": { "type": "mock", "fail": true },
                "odd": { "type": "carrier-pigeon" }
            }),
        );
        let (builder, mocks) = builder(config);
        let ibex = builder.build().unwrap();

        let report = ibex.reloader().load_sources(&ibex).await;

        assert_eq!(report.loaded, ["chat"]);
        assert_eq!(
            report.failed,
            [
                ("flaky".to_string(), "connection to flaky failed: refused".to_string()),
                ("odd".to_string(), "source 'odd' has unknown type 'carrier-pigeon'".to_string()),
            ]
        );
        assert!(mocks.get("chat").is_connected());
        // A source that failed to connect stays registered for a later retry.
        assert_eq!(ibex.source_names(), ["chat", "flaky"]);
    }

    #[tokio::test]
    async fn test_invalid_value_leaves_config_alone() {
        let ibex = started("invalid-config").await;

        assert!(ibex.set_config_value("botname", json!("two words")).is_err());
        assert_eq!(ibex.config().botname, "ibex");
    }

    #[tokio::test]
    async fn test_reload_databases() {
        let ibex = started("databases").await;
        assert!(ibex.database("main").is_none());

        ibex.set_config_value("databases.main", json!({ "url": "sqlite::memory:" }))
            .unwrap();
        assert_eq!(say(&ibex, ADMIN, "reload databases").await, ["Done"]);

        let pool = ibex.database("main").unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_reload_components() {
        let ibex = started("components").await;
        let dispatcher = ibex.dispatcher();

        assert_eq!(say(&ibex, ADMIN, "reload dispatcher").await, ["Done"]);
        assert!(!Arc::ptr_eq(&dispatcher, &ibex.dispatcher()));

        assert_eq!(say(&ibex, ADMIN, "reload reloader").await, ["Done"]);
        assert_eq!(ibex.reloader().generation(), 1);

        assert_eq!(say(&ibex, ADMIN, "reload auth").await, ["Done"]);
        // Processors are untouched by component reloads.
        assert_eq!(ibex.registry().names().len(), 6);
    }

    #[tokio::test]
    async fn test_sources_lifecycle() {
        let config = loader("sources").set(
            "sources",
            json!({
                "chat": { "type": "mock" },
                "later": { "type": "mock", "autoconnect": false },
                "flaky": { "type": "mock", "fail": true },
                "odd": { "type": "carrier-pigeon" }
            }),
        );
        let (builder, mocks) = builder(config);
        let ibex = builder.build().unwrap();
        ibex.start().await.unwrap();

        assert_eq!(ibex.source_names(), ["chat", "flaky", "later"]);
        let chat = mocks.get("chat");
        assert!(chat.is_connected());
        assert!(!mocks.get("later").is_connected());
        assert!(!mocks.get("flaky").is_connected());

        // Replies travel back through the source that produced the event.
        assert_eq!(chat.inject(ADMIN, "connect to later").await, ["Connected to later"]);
        assert_eq!(chat.sent_texts(), ["Connected to later"]);
        assert!(mocks.get("later").is_connected());

        assert_eq!(
            chat.inject(ADMIN, "sources").await,
            ["chat (connected), flaky (disconnected), later (connected)"]
        );
        assert_eq!(chat.inject(ADMIN, "connect to flaky").await, ["Couldn't connect to flaky"]);

        ibex.stop().await.unwrap();
        assert!(!chat.is_connected());
        assert!(!mocks.get("later").is_connected());
        assert!(ibex.registry().names().is_empty());
    }

    #[tokio::test]
    async fn test_run_until() {
        let (builder, _) = builder(loader("run-until"));
        let ibex = builder.build().unwrap();

        ibex.run_until(async {}).await.unwrap();

        assert!(!ibex.is_running());
        assert!(ibex.registry().names().is_empty());
    }
}
