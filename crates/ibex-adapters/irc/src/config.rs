//! Per-network settings, read from a `[sources.<name>]` table.

use ibex_core::{SourceError, SourceResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_port() -> u16 {
    6667
}

fn default_max_message_length() -> usize {
    490
}

fn default_whois_timeout_secs() -> u64 {
    15
}

/// Connection settings of one IRC source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrcConfig {
    /// Server host name.
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub nick: String,

    /// Defaults to the nick.
    #[serde(default)]
    pub username: Option<String>,

    /// Defaults to the nick.
    #[serde(default)]
    pub realname: Option<String>,

    /// Server password, sent as `PASS`.
    #[serde(default)]
    pub password: Option<String>,

    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,

    /// User modes applied after registration, e.g. `+B`.
    #[serde(default)]
    pub modes: Option<String>,

    /// Outgoing message text is cut to this many bytes.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// How long a WHOIS identity check may take.
    #[serde(default = "default_whois_timeout_secs")]
    pub whois_timeout_secs: u64,
}

impl IrcConfig {
    /// Reads and validates the settings table of a source.
    pub fn from_settings(settings: &Value) -> SourceResult<Self> {
        let config: Self = serde_json::from_value(settings.clone())
            .map_err(|e| SourceError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SourceResult<()> {
        if self.server.trim().is_empty() {
            return Err(SourceError::InvalidConfig("server must not be empty".to_string()));
        }
        if self.nick.is_empty() || self.nick.contains(char::is_whitespace) {
            return Err(SourceError::InvalidConfig(format!("invalid nick '{}'", self.nick)));
        }
        if self.max_message_length == 0 {
            return Err(SourceError::InvalidConfig(
                "max_message_length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nick)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = IrcConfig::from_settings(&json!({ "server": "irc.example.org", "nick": "ibex" })).unwrap();

        assert_eq!(config.port, 6667);
        assert_eq!(config.max_message_length, 490);
        assert_eq!(config.address(), "irc.example.org:6667");
        assert_eq!(config.username(), "ibex");
        assert_eq!(config.realname(), "ibex");
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            IrcConfig::from_settings(&json!({ "server": "irc.example.org" })),
            Err(SourceError::InvalidConfig(_))
        ));
        assert!(IrcConfig::from_settings(&json!({ "server": "", "nick": "ibex" })).is_err());
        assert!(IrcConfig::from_settings(&json!({ "server": "irc.example.org", "nick": "two words" })).is_err());
    }
}
