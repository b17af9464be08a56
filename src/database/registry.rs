//! Named connection pool registry.
//!
//! Pools are created lazily on first reference and shared for the life of the
//! process. Construction is single-flight per name: concurrent first requests
//! wait on the same `OnceCell`, and a failed construction leaves the cell empty
//! so the next request retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use super::backend::Pool;
use super::error::DatabaseError;
use super::postgres::PgDatabase;
use crate::config::DatabaseConfig;

/// Opens a pool for a connection string.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, pool_name: &str, connection_string: &str) -> Result<Pool, DatabaseError>;
}

pub struct PgConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_secs(config.connection_timeout),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, pool_name: &str, connection_string: &str) -> Result<Pool, DatabaseError> {
        url::Url::parse(connection_string).map_err(|_| DatabaseError::InvalidDatabaseUrl(pool_name.to_string()))?;
        let database = PgDatabase::connect(connection_string, self.max_connections, self.acquire_timeout).await?;
        Ok(Arc::new(database))
    }
}

pub struct PoolRegistry {
    connector: Arc<dyn Connector>,
    pools: RwLock<HashMap<String, Arc<OnceCell<Pool>>>>,
}

impl PoolRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector, pools: RwLock::new(HashMap::new()) }
    }

    /// Returns the pool registered under `name`, creating it from
    /// `connection_string` on first use.
    pub async fn resolve(&self, name: &str, connection_string: Option<&str>) -> Result<Pool, DatabaseError> {
        // Fast path: try read lock
        let existing = {
            let pools = self.pools.read().await;
            pools.get(name).cloned()
        };
        if let Some(pool) = existing.as_ref().and_then(|cell| cell.get()) {
            return Ok(pool.clone());
        }

        let connection_string = connection_string.ok_or_else(|| DatabaseError::ConfigMissing(name.to_string()))?;

        let cell = match existing {
            Some(cell) => cell,
            None => {
                let mut pools = self.pools.write().await;
                pools.entry(name.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
            }
        };

        let pool = cell
            .get_or_try_init(|| async {
                let pool = self.connector.connect(name, connection_string).await?;
                info!(pool = name, backend = pool.backend(), url = %redact(connection_string), "Created database pool");
                Ok::<Pool, DatabaseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    pub async fn names(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        let mut names: Vec<String> = pools
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<OnceCell<Pool>>)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };
        for (name, cell) in drained {
            if let Some(pool) = cell.get() {
                pool.close().await;
                info!(pool = %name, "Closed database pool");
            }
        }
    }
}

/// Connection string with any password replaced, for logs.
pub fn redact(connection_string: &str) -> String {
    match url::Url::parse(connection_string) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
