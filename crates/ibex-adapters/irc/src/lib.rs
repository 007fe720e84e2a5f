//! IRC source for Ibex.
//!
//! Connects to one IRC network over plain TCP and turns channel traffic into
//! [`Event`](ibex_core::Event)s:
//!
//! | IRC | Event |
//! |-----|-------|
//! | `PRIVMSG` | `message` (`extra.action = true` for CTCP ACTION) |
//! | `NOTICE` | `notice` |
//! | `JOIN` / `PART` / `QUIT` / `KICK` | `state` (`joined`, `parted`, `quit`, `kicked`) |
//!
//! Lines sent to the bot's nick are private and always addressed; channel
//! lines are addressed when they start with `<nick>:` or `<nick>,`, which is
//! stripped from the text.
//!
//! ```toml
//! [sources.libera]
//! type = "irc"
//! server = "irc.libera.chat"
//! nick = "ibex"
//! channels = ["#ibex"]
//! ```
//!
//! ```rust,ignore
//! let ibex = Ibex::builder()
//!     .source_kind("irc", IrcSource::from_settings)
//!     .build()?;
//! ```

pub mod config;
pub mod protocol;
pub mod source;

pub use config::IrcConfig;
pub use protocol::Message;
pub use source::IrcSource;
