//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ibex_framework::AuthPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbexConfig {
    /// Nick the bot answers to where a source does not override it.
    #[serde(default = "default_botname")]
    pub botname: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub auth: AuthPolicy,

    /// Named database pools.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    /// Named source connections.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl Default for IbexConfig {
    fn default() -> Self {
        Self {
            botname: default_botname(),
            logging: LoggingConfig::default(),
            dispatcher: DispatcherConfig::default(),
            auth: AuthPolicy::default(),
            databases: BTreeMap::new(),
            sources: BTreeMap::new(),
            plugins: PluginsConfig::default(),
        }
    }
}

fn default_botname() -> String {
    "ibex".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Rolled files get a date suffix.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-target levels, e.g. `ibex_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the log call site.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Dispatcher tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Upper bound for one handler invocation. `0` disables the bound.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_secs > 0).then(|| Duration::from_secs(self.handler_timeout_secs))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

fn default_handler_timeout_secs() -> u64 {
    120
}

// =============================================================================
// Databases
// =============================================================================

/// One named SQLite pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://ibex.db` or `sqlite::memory:`.
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

// =============================================================================
// Sources
// =============================================================================

/// One named source connection.
///
/// Every key other than `type` and `autoconnect` is handed to the source
/// implementation untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind, e.g. `irc`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_true")]
    pub autoconnect: bool,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl SourceConfig {
    pub fn settings_value(&self) -> Value {
        Value::Object(self.settings.clone())
    }
}

// =============================================================================
// Plugins
// =============================================================================

/// Which processors load, and their configuration sections.
///
/// ```toml
/// [plugins]
/// noload = ["apt"]
///
/// [plugins.apt]
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// When non-empty, only these processors load.
    #[serde(default)]
    pub load: Vec<String>,

    /// Processors or features that never load automatically.
    #[serde(default)]
    pub noload: Vec<String>,

    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

impl PluginsConfig {
    /// Configuration section of processor `name`, or `Null`.
    pub fn section(&self, name: &str) -> Value {
        self.sections.get(name).cloned().unwrap_or(Value::Null)
    }
}
