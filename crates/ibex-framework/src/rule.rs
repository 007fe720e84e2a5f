//! Rules: a pattern, an optional permission and a handler.
//!
//! Each rule is a small tower stack built once, when the processor is
//! declared:
//!
//! ```text
//! Filter<MatchPredicate>            ← regex match, captures become the request
//!   └─ AsyncFilter<AuthPredicate>   ← only when a permission is required
//!        └─ HandlerService          ← the user's handler
//! ```
//!
//! A pattern that does not match yields [`EventSkipped`]; a failed permission
//! check yields [`Denied`]. The dispatcher treats both as "this rule does not
//! apply", never as failures.
//!
//! Matching policy is uniform across rules: patterns are case-insensitive,
//! `.` also matches newlines, and the message is trimmed before matching.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use regex::{Regex, RegexBuilder};
use tower::filter::{AsyncFilterLayer, AsyncPredicate, Predicate};
use tower::util::BoxCloneSyncService;
use tower::{BoxError, ServiceBuilder};
use tracing::debug;

use crate::context::HandlerContext;
use crate::error::{Denied, EventSkipped, RuleError, RuleResult};
use crate::handler::{Flow, Handler, HandlerService};

// ============================================================================
// Captures
// ============================================================================

/// Positional capture groups of a matched pattern, group 0 excluded.
///
/// Groups that did not participate in the match are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<Option<String>>);

impl Captures {
    /// Returns group `index` (0 is the first parenthesised group).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|g| g.as_deref())
    }

    /// Like [`get`](Self::get) but returns `""` for missing groups.
    pub fn str(&self, index: usize) -> &str {
        self.get(index).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|g| g.as_deref())
    }
}

impl From<Vec<Option<String>>> for Captures {
    fn from(groups: Vec<Option<String>>) -> Self {
        Self(groups)
    }
}

// ============================================================================
// Pattern
// ============================================================================

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> RuleResult<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map(|regex| Self { regex })
            .map_err(|e| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Matches `text` and returns its capture groups.
    pub fn captures(&self, text: &str) -> Option<Captures> {
        let caps = self.regex.captures(text.trim())?;
        Some(Captures(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        ))
    }
}

/// What makes a rule fire.
#[derive(Debug, Clone)]
enum Trigger {
    Pattern(Arc<Pattern>),
    Any,
}

// ============================================================================
// Predicates
// ============================================================================

/// The request handed past the pattern filter.
pub struct Invocation {
    pub ctx: Arc<HandlerContext>,
    pub args: Captures,
}

/// Synchronous filter turning a context into an [`Invocation`] on match.
#[derive(Clone)]
pub struct MatchPredicate {
    trigger: Trigger,
}

impl Predicate<Arc<HandlerContext>> for MatchPredicate {
    type Request = Invocation;

    fn check(&mut self, ctx: Arc<HandlerContext>) -> Result<Invocation, BoxError> {
        let args = match &self.trigger {
            Trigger::Any => Captures::default(),
            Trigger::Pattern(pattern) => {
                let Some(text) = ctx.event().message.as_deref() else {
                    return Err(Box::new(EventSkipped));
                };
                pattern.captures(text).ok_or(EventSkipped)?
            }
        };
        Ok(Invocation { ctx, args })
    }
}

/// Asynchronous filter requiring the sender to hold a permission.
#[derive(Clone)]
pub struct AuthPredicate {
    permission: Arc<str>,
}

impl AuthPredicate {
    pub fn new(permission: &str) -> Self {
        Self {
            permission: Arc::from(permission),
        }
    }
}

impl AsyncPredicate<Invocation> for AuthPredicate {
    type Future = BoxFuture<'static, Result<Invocation, BoxError>>;
    type Request = Invocation;

    fn check(&mut self, invocation: Invocation) -> Self::Future {
        let permission = Arc::clone(&self.permission);
        async move {
            if invocation.ctx.authorise(&permission).await {
                Ok(invocation)
            } else {
                debug!(
                    processor = %invocation.ctx.processor(),
                    sender = %invocation.ctx.event().sender,
                    permission = %permission,
                    "Permission denied"
                );
                Err(Denied {
                    permission: permission.to_string(),
                }
                .into())
            }
        }
        .boxed()
    }
}

// ============================================================================
// Rule
// ============================================================================

/// The type-erased service a rule is compiled into.
pub type RuleService = BoxCloneSyncService<Arc<HandlerContext>, Flow, BoxError>;

/// A pattern (or catch-all), an optional permission and a handler.
#[derive(Clone)]
pub struct Rule {
    trigger: Trigger,
    authorization: Option<String>,
    service: RuleService,
}

impl Rule {
    /// The pattern source, or `None` for catch-all rules.
    pub fn pattern(&self) -> Option<&str> {
        match &self.trigger {
            Trigger::Pattern(p) => Some(p.as_str()),
            Trigger::Any => None,
        }
    }

    /// The permission required before the handler runs.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// A fresh handle to the compiled service stack.
    pub fn service(&self) -> RuleService {
        self.service.clone()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern())
            .field("authorization", &self.authorization)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`on_pattern`] and [`on_any`].
pub struct RuleBuilder {
    trigger: RuleResult<Trigger>,
    authorization: Option<String>,
}

/// Starts a rule matching `pattern` against the event's message.
pub fn on_pattern(pattern: &str) -> RuleBuilder {
    RuleBuilder {
        trigger: Pattern::new(pattern).map(|p| Trigger::Pattern(Arc::new(p))),
        authorization: None,
    }
}

/// Starts a rule matching every event the processor accepts.
pub fn on_any() -> RuleBuilder {
    RuleBuilder {
        trigger: Ok(Trigger::Any),
        authorization: None,
    }
}

impl RuleBuilder {
    /// Requires the sender to hold `permission`.
    pub fn authorise(mut self, permission: impl Into<String>) -> Self {
        self.authorization = Some(permission.into());
        self
    }

    /// Finishes the rule with `handler`.
    pub fn handler<H: Handler>(self, handler: H) -> RuleResult<Rule> {
        let trigger = self.trigger?;
        let auth_layer = self
            .authorization
            .as_deref()
            .map(|permission| AsyncFilterLayer::new(AuthPredicate::new(permission)));

        let service = ServiceBuilder::new()
            .filter(MatchPredicate {
                trigger: trigger.clone(),
            })
            .option_layer(auth_layer)
            .service(HandlerService::new(handler));

        Ok(Rule {
            trigger,
            authorization: self.authorization,
            service: BoxCloneSyncService::new(service),
        })
    }
}
