//! Processors: named, hot-loadable bundles of rules.
//!
//! ```rust,ignore
//! fn crypto() -> RuleResult<Processor> {
//!     Processor::builder("crypto")
//!         .feature("crypto")
//!         .usage("md5|sha1|... <text>")
//!         .rule(on_pattern(r"^(md5|sha1|sha256)\s+(.+?)$").handler(hash))
//!         .rule(on_pattern(r"^rot13\s+(.+)$").handler(rot13))
//!         .build()
//! }
//! ```
//!
//! Rules run in declaration order. A handler returning [`Flow::Stop`] ends the
//! processor's turn for that event; other processors are unaffected.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tower::{BoxError, ServiceExt};
use tracing::{debug, error, warn};

use ibex_core::{Event, EventKind};

use crate::context::HandlerContext;
use crate::control::ProcessorInfo;
use crate::error::{Denied, EventSkipped, RuleResult, SetupError};
use crate::handler::Flow;
use crate::options::{OptionSpec, Options};
use crate::rule::Rule;

// ─── SetupContext ─────────────────────────────────────────────────────────────

/// Context passed to a processor's setup hook.
#[derive(Clone, Debug)]
pub struct SetupContext {
    processor: Arc<str>,
    options: Arc<Options>,
}

impl SetupContext {
    pub fn processor(&self) -> &str {
        &self.processor
    }

    /// Options resolved from the live configuration.
    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// Setup hook. An `Err` keeps the processor unregistered.
pub type SetupFn = Arc<dyn Fn(SetupContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Teardown hook, run on unload.
pub type TeardownFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ─── Processor ────────────────────────────────────────────────────────────────

/// A named bundle of rules with lifecycle hooks and declared options.
pub struct Processor {
    name: Arc<str>,
    feature: Option<String>,
    usage: Option<String>,
    priority: i32,
    addressed: bool,
    kinds: Vec<EventKind>,
    rules: Vec<Rule>,
    option_specs: Vec<OptionSpec>,
    options: Arc<Options>,
    setup_fn: Option<SetupFn>,
    teardown_fn: Option<TeardownFn>,
}

impl Processor {
    pub fn builder(name: impl Into<String>) -> ProcessorBuilder {
        ProcessorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub fn usage(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    /// Lower values run earlier. Equal priorities keep registration order.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn option_specs(&self) -> &[OptionSpec] {
        &self.option_specs
    }

    /// Options resolved at setup. Empty before the processor is loaded.
    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: self.name.to_string(),
            feature: self.feature.clone(),
            usage: self.usage.clone(),
        }
    }

    /// Whether this processor wants to see `event` at all.
    pub fn accepts(&self, event: &Event) -> bool {
        self.kinds.contains(&event.kind) && (!self.addressed || event.addressed)
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Resolves options from `section` and runs the setup hook.
    pub(crate) async fn setup(&mut self, section: &Value) -> Result<(), SetupError> {
        let options = Arc::new(Options::resolve(&self.name, &self.option_specs, section)?);

        if let Some(setup) = &self.setup_fn {
            let ctx = SetupContext {
                processor: Arc::clone(&self.name),
                options: Arc::clone(&options),
            };
            let outcome = AssertUnwindSafe(setup(ctx)).catch_unwind().await;
            let reason = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            if let Some(reason) = reason {
                return Err(SetupError::Hook {
                    processor: self.name.to_string(),
                    reason,
                });
            }
        }

        self.options = options;
        Ok(())
    }

    pub(crate) async fn teardown(&self) {
        if let Some(teardown) = &self.teardown_fn
            && let Err(panic) = AssertUnwindSafe(teardown()).catch_unwind().await
        {
            error!(
                processor = %self.name,
                panic = %panic_message(panic.as_ref()),
                "Teardown panicked"
            );
        }
    }

    /// Runs the rule chain for one event.
    ///
    /// Every failure is contained here: errors and panics are logged, and a
    /// handler exceeding `timeout` is abandoned.
    pub(crate) async fn dispatch_event(&self, ctx: Arc<HandlerContext>, timeout: Option<Duration>) {
        for rule in &self.rules {
            let call = AssertUnwindSafe(rule.service().oneshot(Arc::clone(&ctx))).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(
                            processor = %self.name,
                            rule = ?rule.pattern(),
                            timeout_secs = limit.as_secs(),
                            "Handler timed out"
                        );
                        continue;
                    }
                },
                None => call.await,
            };

            match outcome {
                Ok(Ok(Flow::Continue)) => {}
                Ok(Ok(Flow::Stop)) => {
                    debug!(processor = %self.name, rule = ?rule.pattern(), "Handler stopped the rule chain");
                    break;
                }
                Ok(Err(e)) if e.is::<EventSkipped>() || e.is::<Denied>() => {}
                Ok(Err(e)) => {
                    error!(
                        processor = %self.name,
                        rule = ?rule.pattern(),
                        sender = %ctx.event().sender,
                        message = ?ctx.event().message,
                        error = %e,
                        "Handler returned an error"
                    );
                }
                Err(panic) => {
                    error!(
                        processor = %self.name,
                        rule = ?rule.pattern(),
                        sender = %ctx.event().sender,
                        message = ?ctx.event().message,
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("feature", &self.feature)
            .field("priority", &self.priority)
            .field("addressed", &self.addressed)
            .field("kinds", &self.kinds)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

// ─── ProcessorBuilder ─────────────────────────────────────────────────────────

/// Builder for [`Processor`].
///
/// Rule errors are collected and reported by [`build`](Self::build), so a
/// declaration reads as one chain.
pub struct ProcessorBuilder {
    name: String,
    feature: Option<String>,
    usage: Option<String>,
    priority: i32,
    addressed: bool,
    kinds: Vec<EventKind>,
    rules: Vec<Rule>,
    option_specs: Vec<OptionSpec>,
    setup_fn: Option<SetupFn>,
    teardown_fn: Option<TeardownFn>,
    error: Option<crate::error::RuleError>,
}

impl ProcessorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature: None,
            usage: None,
            priority: 0,
            addressed: true,
            kinds: vec![EventKind::Message],
            rules: Vec::new(),
            option_specs: Vec::new(),
            setup_fn: None,
            teardown_fn: None,
            error: None,
        }
    }

    /// Feature tag used for help grouping and `noload` filtering.
    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether only events addressed to the bot are seen. Defaults to `true`.
    pub fn addressed(mut self, addressed: bool) -> Self {
        self.addressed = addressed;
        self
    }

    /// Event kinds the processor sees. Defaults to messages only.
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn option(mut self, key: impl Into<String>, description: impl Into<String>, default: Value) -> Self {
        self.option_specs.push(OptionSpec::new(key, description, default));
        self
    }

    pub fn required_option(mut self, key: impl Into<String>, description: impl Into<String>) -> Self {
        self.option_specs.push(OptionSpec::required(key, description));
        self
    }

    pub fn rule(mut self, rule: RuleResult<Rule>) -> Self {
        match rule {
            Ok(rule) => self.rules.push(rule),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn setup<F, Fut, E>(mut self, f: F) -> Self
    where
        F: Fn(SetupContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.setup_fn = Some(Arc::new(move |ctx| {
            let fut = f(ctx);
            async move { fut.await.map_err(Into::into) }.boxed()
        }));
        self
    }

    pub fn teardown<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.teardown_fn = Some(Arc::new(move || f().boxed()));
        self
    }

    pub fn build(self) -> RuleResult<Processor> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Processor {
            name: Arc::from(self.name),
            feature: self.feature,
            usage: self.usage,
            priority: self.priority,
            addressed: self.addressed,
            kinds: self.kinds,
            rules: self.rules,
            option_specs: self.option_specs,
            options: Arc::new(Options::default()),
            setup_fn: self.setup_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}
