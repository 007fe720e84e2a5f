//! Named SQLite pools.
//!
//! Pools are created lazily: no connection is opened until the first query,
//! so a reload never blocks on the database. A reload builds a fresh
//! [`Databases`] and swaps the `Arc`; pools already cloned by running
//! handlers keep working until they are dropped.

use std::collections::BTreeMap;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Errors raised while building database pools.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database '{name}' has an invalid URL: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The set of configured pools.
#[derive(Debug, Default)]
pub struct Databases {
    pools: BTreeMap<String, SqlitePool>,
}

impl Databases {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds one lazy pool per entry. Fails without side effects if any
    /// URL is malformed.
    pub fn from_config(configs: &BTreeMap<String, DatabaseConfig>) -> DatabaseResult<Self> {
        let mut pools = BTreeMap::new();
        for (name, config) in configs {
            let options = SqliteConnectOptions::from_str(&config.url)
                .map_err(|source| DatabaseError::InvalidUrl {
                    name: name.clone(),
                    source,
                })?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_lazy_with(options);
            debug!(database = %name, max_connections = config.max_connections, "Database pool created");
            pools.insert(name.clone(), pool);
        }
        Ok(Self { pools })
    }

    /// A handle to pool `name`. Handles are cheap clones of the pool.
    pub fn get(&self, name: &str) -> Option<SqlitePool> {
        self.pools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.pools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Closes every pool and waits for their connections to finish.
    pub async fn close(&self) {
        for (name, pool) in &self.pools {
            pool.close().await;
            info!(database = %name, "Database pool closed");
        }
    }
}
