//! Built-in processors shipped with Ibex.
//!
//! | Processor | Feature | Commands |
//! |-----------|---------|----------|
//! | `admin` | `plugins` | `list plugins`, `(load\|unload\|reload) <name> plugin`, `reload config`, `reload (reloader\|dispatcher\|auth\|databases)` |
//! | `config` | `config` | `reread config`, `set config <key> to <value>`, `get config <key>` |
//! | `sources` | `sources` | `connect to <source>`, `disconnect from <source>`, `join`/`part <channel> [on <source>]`, `list sources` |
//! | `help` | `help` | `help`, `help <feature>` |
//! | `crypto` | `crypto` | `md5`/`sha1`/`sha2xx <text>`, `b(16\|32\|64)(enc\|dec) <text>`, `rot13 <text>` |
//! | `morse` | `morse` | `morse <text or code>` |
//! | `apt` | `apt` | `apt search <term>`, `apt show <package>`, `apt-file search <file>` |
//!
//! ```rust,ignore
//! let ibex = Ibex::builder().processors(ibex_plugins::catalog()).build()?;
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use ibex_framework::{Control, HandlerContext, ProcessorCatalog};

pub mod admin;
pub mod apt;
pub mod config;
pub mod crypto;
pub mod help;
pub mod morse;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

/// Every built-in processor.
pub fn catalog() -> ProcessorCatalog {
    ProcessorCatalog::new()
        .with("admin", admin::processor)
        .with("config", config::processor)
        .with("sources", sources::processor)
        .with("help", help::processor)
        .with("crypto", crypto::processor)
        .with("morse", morse::processor)
        .with("apt", apt::processor)
}

/// The control surface of the running engine.
pub(crate) fn control(ctx: &HandlerContext) -> anyhow::Result<Arc<dyn Control>> {
    ctx.control()
        .cloned()
        .context("no control surface for this dispatch")
}
