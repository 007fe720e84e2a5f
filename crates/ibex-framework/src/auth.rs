//! Authorization.
//!
//! Rules that declare a permission consult an [`Authorizer`] before their
//! handler runs. The stock implementation, [`Auth`], is compiled from an
//! [`AuthPolicy`] (usually the `[auth]` table of the configuration):
//!
//! ```toml
//! [auth]
//! timeout_secs = 15
//!
//! [auth.accounts.alice]
//! permissions = ["admin"]
//! credentials = [
//!     { method = "hostmask", mask = "alice!*@*.example.org" },
//!     { method = "nickserv", source = "libera" },
//! ]
//! ```
//!
//! Credentials are tried cheapest first: an account established by the
//! transport, then hostmask globs, then a round trip to the source's identity
//! service. Hostmasks use IRC wildcards only (`*` and `?`), match without
//! regard to case, and take `[` and `]` literally since both are legal in
//! nicks. The round trip is bounded by `timeout_secs`; running out of time
//! counts as "not authorised".

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glob::{MatchOptions, Pattern as Glob};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ibex_core::{BoxedSource, Event};

use crate::error::{AuthError, AuthResult};

/// Permission that implies every other permission.
pub const ADMIN_PERMISSION: &str = "admin";

/// Decides whether the sender of an event holds a permission.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorise(&self, event: &Event, permission: &str) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorise(&self, _event: &Event, _permission: &str) -> bool {
        true
    }
}

/// Grants nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl Authorizer for DenyAll {
    async fn authorise(&self, _event: &Event, _permission: &str) -> bool {
        false
    }
}

/// Looks sources up by name, for credentials that need a round trip.
pub trait SourceDirectory: Send + Sync {
    fn source(&self, name: &str) -> Option<BoxedSource>;
}

// =============================================================================
// Policy
// =============================================================================

fn default_timeout_secs() -> u64 {
    15
}

/// Serializable authorization policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPolicy {
    /// Budget for identity round trips, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accounts by name.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountPolicy>,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            accounts: BTreeMap::new(),
        }
    }
}

/// Permissions and credentials of one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPolicy {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// A way for a sender to prove they are an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Credential {
    /// The raw sender identity matches a glob, optionally on one source only.
    Hostmask {
        mask: String,
        #[serde(default)]
        source: Option<String>,
    },
    /// The source's identity service vouches for the nick.
    /// `nick` defaults to the account name.
    Nickserv {
        source: String,
        #[serde(default)]
        nick: Option<String>,
    },
}

// =============================================================================
// Auth
// =============================================================================

const HOSTMASK_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiles an IRC hostmask: brackets are escaped and runs of `*` collapse
/// to one.
fn hostmask_glob(mask: &str) -> Result<Glob, glob::PatternError> {
    let mut pattern = String::with_capacity(mask.len() + 4);
    for c in mask.chars() {
        match c {
            '[' => pattern.push_str("[[]"),
            ']' => pattern.push_str("[]]"),
            '*' if pattern.ends_with('*') => {}
            c => pattern.push(c),
        }
    }
    Glob::new(&pattern)
}

struct Hostmask {
    glob: Glob,
    source: Option<String>,
}

struct Nickserv {
    source: String,
    nick: String,
}

struct Account {
    name: String,
    permissions: Vec<String>,
    hostmasks: Vec<Hostmask>,
    nickserv: Vec<Nickserv>,
}

impl Account {
    fn grants(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == ADMIN_PERMISSION)
    }

    fn matches_hostmask(&self, event: &Event) -> bool {
        self.hostmasks.iter().any(|h| {
            h.source.as_deref().is_none_or(|s| s == event.source)
                && h.glob.matches_with(&event.sender, HOSTMASK_MATCH)
        })
    }
}

/// Policy-driven [`Authorizer`].
pub struct Auth {
    accounts: Vec<Account>,
    sources: Option<Arc<dyn SourceDirectory>>,
    timeout: Duration,
}

impl Auth {
    /// Compiles `policy`. Invalid hostmask globs are rejected.
    pub fn new(policy: &AuthPolicy) -> AuthResult<Self> {
        let mut accounts = Vec::with_capacity(policy.accounts.len());
        for (name, account) in &policy.accounts {
            let mut hostmasks = Vec::new();
            let mut nickserv = Vec::new();
            for credential in &account.credentials {
                match credential {
                    Credential::Hostmask { mask, source } => {
                        let glob = hostmask_glob(mask).map_err(|e| AuthError::InvalidHostmask {
                            account: name.clone(),
                            mask: mask.clone(),
                            reason: e.to_string(),
                        })?;
                        hostmasks.push(Hostmask {
                            glob,
                            source: source.clone(),
                        });
                    }
                    Credential::Nickserv { source, nick } => nickserv.push(Nickserv {
                        source: source.clone(),
                        nick: nick.clone().unwrap_or_else(|| name.clone()),
                    }),
                }
            }
            accounts.push(Account {
                name: name.clone(),
                permissions: account.permissions.clone(),
                hostmasks,
                nickserv,
            });
        }

        Ok(Self {
            accounts,
            sources: None,
            timeout: Duration::from_secs(policy.timeout_secs),
        })
    }

    /// Enables credentials that need a round trip to a source.
    pub fn with_sources(mut self, sources: Arc<dyn SourceDirectory>) -> Self {
        self.sources = Some(sources);
        self
    }

    async fn verify(&self, event: &Event, nick: &str) -> bool {
        let Some(source) = self.sources.as_ref().and_then(|d| d.source(&event.source)) else {
            return false;
        };
        match tokio::time::timeout(self.timeout, source.verify_identity(nick)).await {
            Ok(Ok(verified)) => verified,
            Ok(Err(e)) => {
                debug!(source = %event.source, nick = %nick, error = %e, "Identity check failed");
                false
            }
            Err(_) => {
                warn!(
                    source = %event.source,
                    nick = %nick,
                    timeout_secs = self.timeout.as_secs(),
                    "Identity check timed out"
                );
                false
            }
        }
    }
}

#[async_trait]
impl Authorizer for Auth {
    async fn authorise(&self, event: &Event, permission: &str) -> bool {
        let candidates: Vec<&Account> = self
            .accounts
            .iter()
            .filter(|a| a.grants(permission))
            .collect();

        if let Some(account) = event.account.as_deref()
            && candidates.iter().any(|a| a.name == account)
        {
            return true;
        }

        if candidates.iter().any(|a| a.matches_hostmask(event)) {
            return true;
        }

        for account in &candidates {
            for credential in &account.nickserv {
                if credential.source == event.source
                    && credential.nick.eq_ignore_ascii_case(&event.sender_id)
                    && self.verify(event, &credential.nick).await
                {
                    debug!(account = %account.name, permission = %permission, "Authorised via identity service");
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ibex_core::{BoxedSink, Response, Source, SourceResult};
    use serde_json::json;

    use super::*;

    struct IdentityService {
        answer: Option<bool>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Source for IdentityService {
        fn name(&self) -> &str {
            "libera"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn connect(&self, _sink: BoxedSink) -> SourceResult<()> {
            Ok(())
        }

        async fn disconnect(&self) -> SourceResult<()> {
            Ok(())
        }

        async fn send(&self, _response: &Response) -> SourceResult<()> {
            Ok(())
        }

        async fn verify_identity(&self, _nick: &str) -> SourceResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(answer) => Ok(answer),
                None => futures::future::pending().await,
            }
        }
    }

    struct Directory(Arc<IdentityService>);

    impl SourceDirectory for Directory {
        fn source(&self, name: &str) -> Option<BoxedSource> {
            (name == "libera").then(|| Arc::clone(&self.0) as BoxedSource)
        }
    }

    fn policy() -> AuthPolicy {
        serde_json::from_value(json!({
            "timeout_secs": 2,
            "accounts": {
                "alice": {
                    "permissions": ["config"],
                    "credentials": [{ "method": "hostmask", "mask": "alice!*@*.example.org" }]
                },
                "bob": {
                    "permissions": ["admin"],
                    "credentials": [{ "method": "nickserv", "source": "libera" }]
                }
            }
        }))
        .unwrap()
    }

    fn event(sender: &str, nick: &str) -> Event {
        Event::message("libera", "hi").with_sender(sender, nick)
    }

    fn auth_with(answer: Option<bool>) -> (Auth, Arc<IdentityService>) {
        let identity = Arc::new(IdentityService {
            answer,
            calls: AtomicUsize::new(0),
        });
        let auth = Auth::new(&policy())
            .unwrap()
            .with_sources(Arc::new(Directory(Arc::clone(&identity))));
        (auth, identity)
    }

    #[tokio::test]
    async fn test_hostmask_grants_listed_permission() {
        let (auth, _) = auth_with(Some(false));
        let alice = event("alice!al@home.example.org", "alice");

        assert!(auth.authorise(&alice, "config").await);
        assert!(!auth.authorise(&alice, "plugins").await);
        assert!(!auth.authorise(&event("alice!al@evil.net", "alice"), "config").await);
    }

    #[tokio::test]
    async fn test_admin_implies_everything() {
        let (auth, identity) = auth_with(Some(true));
        let bob = event("bob!b@host", "Bob");

        assert!(auth.authorise(&bob, "plugins").await);
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_account() {
        let (auth, identity) = auth_with(Some(false));
        let event = event("bob!b@host", "someone").with_account("bob");

        assert!(auth.authorise(&event, "sources").await);
        assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_timeout_denies() {
        let (auth, identity) = auth_with(None);

        assert!(!auth.authorise(&event("bob!b@host", "bob"), "plugins").await);
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hostmask_is_case_insensitive_and_literal() {
        let policy: AuthPolicy = serde_json::from_value(json!({
            "accounts": {
                "dave": {
                    "permissions": ["config"],
                    "credentials": [{ "method": "hostmask", "mask": "[Dave]!**@*.Example.org" }]
                }
            }
        }))
        .unwrap();
        let auth = Auth::new(&policy).unwrap();

        assert!(auth.authorise(&event("[dave]!d@HOME.example.ORG", "[dave]"), "config").await);
        assert!(!auth.authorise(&event("d!d@home.example.org", "d"), "config").await);
        assert!(!auth.authorise(&event("[dave]!d@home.example.net", "[dave]"), "config").await);
    }

    #[test]
    fn test_hostmask_glob() {
        assert!(hostmask_glob("[eve").is_ok());
        assert_eq!(hostmask_glob("a***b[c]").unwrap().as_str(), "a*b[[]c[]]");
    }
}
