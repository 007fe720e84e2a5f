//! Hot reloading of the engine's replaceable parts.
//!
//! Every operation builds its replacement completely before touching the
//! running application, so a failure leaves the previous component in
//! place. Source connections are never closed by a reload: sources hold the
//! application context as their sink, and the context always forwards to the
//! *current* dispatcher and authorizer.

use std::sync::Arc;

use ibex_framework::{Auth, Dispatcher, DispatcherSettings, ProcessorCatalog};
use tracing::{info, warn};

use crate::databases::Databases;
use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Ibex;
use crate::sources::SourceCatalog;

/// Outcome of a bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// Names that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    fn fail(&mut self, name: &str, reason: impl ToString) {
        self.failed.push((name.to_string(), reason.to_string()));
    }
}

/// Rebuilds dispatcher, databases, authorization, processors and sources
/// from the live configuration.
#[derive(Clone)]
pub struct Reloader {
    processors: Arc<ProcessorCatalog>,
    sources: Arc<SourceCatalog>,
    generation: u64,
}

impl std::fmt::Debug for Reloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reloader")
            .field("processors", &self.processors.names())
            .field("sources", &self.sources)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Reloader {
    pub fn new(processors: ProcessorCatalog, sources: SourceCatalog) -> Self {
        Self {
            processors: Arc::new(processors),
            sources: Arc::new(sources),
            generation: 0,
        }
    }

    /// How many times this reloader has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn processors(&self) -> &ProcessorCatalog {
        &self.processors
    }

    pub fn sources(&self) -> &SourceCatalog {
        &self.sources
    }

    /// A fresh reloader over the same catalogs.
    pub fn rebuilt(&self) -> Self {
        Self {
            processors: Arc::clone(&self.processors),
            sources: Arc::clone(&self.sources),
            generation: self.generation + 1,
        }
    }

    /// Installs a dispatcher built from the current `[dispatcher]` settings.
    /// Dispatches already running finish on the dispatcher they started with.
    pub fn reload_dispatcher(&self, ibex: &Ibex) {
        let config = ibex.config();
        let settings = DispatcherSettings {
            handler_timeout: config.dispatcher.handler_timeout(),
        };
        let dispatcher = Dispatcher::new(Arc::clone(ibex.registry())).with_settings(settings);
        ibex.set_dispatcher(Arc::new(dispatcher));
        info!(handler_timeout = ?settings.handler_timeout, "Dispatcher reloaded");
    }

    /// Replaces every database pool.
    pub fn reload_databases(&self, ibex: &Ibex) -> RuntimeResult<()> {
        let config = ibex.config();
        let databases = Databases::from_config(&config.databases)?;
        let count = databases.len();
        ibex.set_databases(Arc::new(databases));
        info!(databases = count, "Databases reloaded");
        Ok(())
    }

    /// Recompiles the authorization policy.
    pub fn reload_auth(&self, ibex: &Ibex) -> RuntimeResult<()> {
        let config = ibex.config();
        let auth = Auth::new(&config.auth)?.with_sources(ibex.sources().clone());
        ibex.set_authorizer(Arc::new(auth));
        info!(accounts = config.auth.accounts.len(), "Authorization reloaded");
        Ok(())
    }

    /// Loads every catalog processor selected by `[plugins]` that is not
    /// loaded yet. Failures are reported and skipped.
    pub async fn load_processors(&self, ibex: &Ibex) -> LoadReport {
        let config = ibex.config();
        let mut report = LoadReport::default();

        for name in self.processors.select(&config.plugins.load, &config.plugins.noload) {
            if ibex.registry().contains(&name) {
                continue;
            }
            match self.load_processor(ibex, &name).await {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    warn!(processor = %name, error = %e, "Couldn't load processor");
                    report.fail(&name, e);
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Processors loaded"
        );
        report
    }

    pub async fn load_processor(&self, ibex: &Ibex, name: &str) -> RuntimeResult<()> {
        let processor = self.processors.create(name)?;
        let section = ibex.config().plugins.section(name);
        ibex.registry().load(processor, &section).await?;
        Ok(())
    }

    pub async fn unload_processor(&self, ibex: &Ibex, name: &str) -> RuntimeResult<()> {
        ibex.registry().unload(name).await?;
        Ok(())
    }

    /// Builds a fresh instance of `name` from the catalog and swaps it in.
    pub async fn reload_processor(&self, ibex: &Ibex, name: &str) -> RuntimeResult<()> {
        let processor = self.processors.create(name)?;
        let section = ibex.config().plugins.section(name);
        ibex.registry().reload(processor, &section).await?;
        Ok(())
    }

    /// Creates every configured source that does not exist yet, connecting
    /// those marked `autoconnect`. A source whose connection fails stays
    /// registered so it can be connected later.
    pub async fn load_sources(&self, ibex: &Ibex) -> LoadReport {
        let config = ibex.config();
        let mut report = LoadReport::default();

        for (name, source_config) in &config.sources {
            if ibex.sources().contains(name) {
                continue;
            }
            let settings = source_config.settings_value();
            let source = match self.sources.create(&source_config.kind, name, &settings) {
                Some(Ok(source)) => source,
                Some(Err(e)) => {
                    warn!(source = %name, error = %e, "Couldn't create source");
                    report.fail(name, e);
                    continue;
                }
                None => {
                    let e = RuntimeError::UnknownSourceKind {
                        name: name.clone(),
                        kind: source_config.kind.clone(),
                    };
                    warn!(source = %name, error = %e, "Couldn't create source");
                    report.fail(name, e);
                    continue;
                }
            };
            ibex.sources().insert(name.clone(), Arc::clone(&source));

            if source_config.autoconnect {
                let connected = match ibex.sink() {
                    Ok(sink) => source.connect(sink).await.map_err(RuntimeError::from),
                    Err(e) => Err(e),
                };
                if let Err(e) = connected {
                    warn!(source = %name, error = %e, "Couldn't connect source");
                    report.fail(name, e);
                    continue;
                }
            }
            report.loaded.push(name.clone());
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Sources loaded"
        );
        report
    }
}
