//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DatabaseConfig, IbexConfig, SourceConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &IbexConfig) -> ConfigResult<()> {
    validate_botname(&config.botname)?;
    for (name, database) in &config.databases {
        validate_database(name, database)?;
    }
    for (name, source) in &config.sources {
        validate_source(name, source)?;
    }
    Ok(())
}

fn validate_botname(botname: &str) -> ConfigResult<()> {
    if botname.is_empty() {
        return Err(ConfigError::validation("botname cannot be empty"));
    }
    if botname.contains(char::is_whitespace) {
        return Err(ConfigError::validation("botname cannot contain whitespace"));
    }
    Ok(())
}

fn validate_database(name: &str, database: &DatabaseConfig) -> ConfigResult<()> {
    if !database.url.starts_with("sqlite:") {
        return Err(ConfigError::validation(format!(
            "database '{name}': URL must start with 'sqlite:'"
        )));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::validation(format!(
            "database '{name}': max_connections must be greater than 0"
        )));
    }
    Ok(())
}

fn validate_source(name: &str, source: &SourceConfig) -> ConfigResult<()> {
    if name.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "source name '{name}' cannot contain whitespace"
        )));
    }
    if source.kind.is_empty() {
        return Err(ConfigError::validation(format!("source '{name}': missing type")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&IbexConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_botname() {
        let mut config = IbexConfig::default();
        config.botname = "two words".to_string();
        assert!(matches!(validate_config(&config), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_validate_database_url() {
        let mut config = IbexConfig::default();
        config.databases.insert(
            "main".to_string(),
            DatabaseConfig {
                url: "postgres://localhost/ibex".to_string(),
                max_connections: 5,
            },
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_source_type() {
        let mut config = IbexConfig::default();
        config.sources.insert(
            "libera".to_string(),
            serde_json::from_value(json!({ "type": "" })).unwrap(),
        );
        assert!(validate_config(&config).is_err());
    }
}
