//! Logging setup over `tracing-subscriber`.
//!
//! The usual entry point is [`init_from_config`] with the `[logging]` table:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//! output = "file"
//! file_path = "/var/log/ibex/ibex.log"
//! rotation = "daily"
//!
//! [logging.filters]
//! ibex_adapter_irc = "trace"
//!
//! [logging.span_events]
//! close = true
//! ```
//!
//! Every dispatch runs inside a `dispatch` span carrying the source, kind,
//! sender and channel, so enabling `span_events.close` gives one line per
//! event with its timing.
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-target
//! filters are added on top of either.

use std::path::Path;

use tracing::{Subscriber, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "ibex.log";

/// Installs the global subscriber described by `config`. A subscriber that
/// is already installed is left alone.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

fn fmt_span(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    }
}

/// Builder for the global subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: FmtSpan,
    format: LogFormat,
    output: LogOutput,
    rotation: LogRotation,
    file_path: Option<std::path::PathBuf>,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: FmtSpan::NONE,
            format: LogFormat::default(),
            output: LogOutput::default(),
            rotation: LogRotation::default(),
            file_path: None,
            thread_ids: false,
            file_location: false,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect();
        directives.sort();

        Self {
            level: config.level.to_tracing_level(),
            directives,
            span_events: fmt_span(&config.span_events),
            format: config.format,
            output: config.output,
            rotation: config.rotation,
            file_path: config.file_path.clone(),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `ibex_adapter_irc=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: FmtSpan) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sends output to `path`, rolled over per `rotation`.
    pub fn file(mut self, path: impl AsRef<Path>, rotation: LogRotation) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.as_ref().to_path_buf());
        self.rotation = rotation;
        self
    }

    pub fn stderr(mut self) -> Self {
        self.output = LogOutput::Stderr;
        self
    }

    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()));
        self.directives.iter().fold(base, |filter, directive| {
            match directive.parse() {
                Ok(d) => filter.add_directive(d),
                Err(_) => filter,
            }
        })
    }

    /// Returns the writer, plus the reason a requested log file had to be
    /// replaced by stdout.
    fn writer(&self) -> (BoxMakeWriter, Option<String>) {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), None),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), None),
            (LogOutput::File, Some(path)) => {
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_LOG_FILE);
                match RollingFileAppender::builder()
                    .rotation(rotation(self.rotation))
                    .filename_prefix(name)
                    .build(directory)
                {
                    Ok(appender) => (BoxMakeWriter::new(appender), None),
                    Err(e) => (BoxMakeWriter::new(std::io::stdout), Some(e.to_string())),
                }
            }
            (LogOutput::File, None) => (
                BoxMakeWriter::new(std::io::stdout),
                Some("no file_path configured".to_string()),
            ),
        }
    }

    fn layer<S>(&self, writer: BoxMakeWriter) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.clone())
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, fallback) = self.writer();
        tracing_subscriber::registry()
            .with(self.layer(writer))
            .with(self.filter())
            .try_init()?;

        if let Some(reason) = fallback {
            warn!(reason = %reason, "Cannot open log file, logging to stdout");
        }
        Ok(())
    }
}
