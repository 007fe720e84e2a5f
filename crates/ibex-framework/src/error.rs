//! Error types for the Ibex framework.

use thiserror::Error;

/// Returned by a rule's pattern filter when an event does **not** match.
///
/// The dispatcher recognises this error and silently moves on to the next
/// rule. All other errors are treated as genuine failures.
#[derive(Debug, Clone, Error)]
#[error("event skipped by filter")]
pub struct EventSkipped;

/// Returned by a rule's authorization filter when the sender lacks a permission.
///
/// Like [`EventSkipped`] this is not reported as a failure: the handler simply
/// does not run.
#[derive(Debug, Clone, Error)]
#[error("permission '{permission}' denied")]
pub struct Denied {
    /// The permission that was required.
    pub permission: String,
}

/// Errors raised while declaring rules.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    /// The pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },
}

/// Result type for rule declarations.
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors raised while setting up a processor.
///
/// A processor that fails setup is never registered.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    /// A required option has no configured value and no default.
    #[error("processor '{processor}' requires option '{key}'")]
    MissingOption {
        /// Processor name.
        processor: String,
        /// Option key.
        key: String,
    },

    /// The processor's configuration section is not a table.
    #[error("processor '{processor}' has a malformed configuration section")]
    MalformedSection {
        /// Processor name.
        processor: String,
    },

    /// The processor's setup hook failed.
    #[error("setup of processor '{processor}' failed: {reason}")]
    Hook {
        /// Processor name.
        processor: String,
        /// Error reported by the hook.
        reason: String,
    },
}

/// Errors raised by [`Registry`](crate::Registry) and
/// [`ProcessorCatalog`](crate::ProcessorCatalog) operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A processor with this name is already registered.
    #[error("processor '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// No processor with this name is registered.
    #[error("processor '{0}' is not loaded")]
    NotLoaded(String),

    /// The catalog has no factory for this name.
    #[error("unknown processor '{0}'")]
    UnknownProcessor(String),

    /// A factory produced a processor under a different name.
    #[error("factory for '{expected}' built processor '{actual}'")]
    NameMismatch {
        /// Name the factory was registered under.
        expected: String,
        /// Name of the processor it built.
        actual: String,
    },

    /// A factory failed to declare its rules.
    #[error("processor '{name}' could not be built: {source}")]
    Build {
        /// Processor name.
        name: String,
        /// Underlying rule error.
        #[source]
        source: RuleError,
    },

    /// Setup failed.
    #[error(transparent)]
    Setup(#[from] SetupError),
}

impl RegistryError {
    /// Creates a build error for `name`.
    pub fn build(name: impl Into<String>, source: RuleError) -> Self {
        Self::Build {
            name: name.into(),
            source,
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while compiling an authorization policy.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// A hostmask credential is not a valid glob.
    #[error("account '{account}' has an invalid hostmask '{mask}': {reason}")]
    InvalidHostmask {
        /// Account the credential belongs to.
        account: String,
        /// The rejected mask.
        mask: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Result type for authorization setup.
pub type AuthResult<T> = Result<T, AuthError>;
