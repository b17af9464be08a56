use std::sync::Arc;

use tracing::warn;

use crate::audit::{AuditLogger, AUDIT_POOL};
use crate::auth::directory::UserDirectory;
use crate::auth::{AuthError, SessionKeys};
use crate::config::AppConfig;
use crate::database::{Connector, Database, DatabaseError, MemoryDatabase, Pool, PoolRegistry};
use crate::error::ApiError;
use crate::mock::MockStore;
use crate::schema::{SchemaCatalog, SchemaDescriptor};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<SchemaCatalog>,
    pub registry: Arc<PoolRegistry>,
    pub mock: Arc<MockStore>,
    pub audit: Arc<AuditLogger>,
    pub sessions: Arc<SessionKeys>,
    pub users: Arc<UserDirectory>,
}

/// Where a request's statements run.
pub enum Backend {
    Pool(Pool),
    Mock(Arc<MemoryDatabase>),
}

impl Backend {
    pub fn database(&self) -> &dyn Database {
        match self {
            Backend::Pool(pool) => pool.as_ref(),
            Backend::Mock(memory) => memory.as_ref(),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Backend::Mock(_))
    }
}

impl AppState {
    pub fn new(config: AppConfig, catalog: SchemaCatalog, connector: Arc<dyn Connector>) -> Result<Self, AuthError> {
        let registry = Arc::new(PoolRegistry::new(connector));
        let audit_registry = registry.clone();
        Self::with_audit(config, catalog, registry, move |config| {
            AuditLogger::new(audit_registry, config.pool_url(AUDIT_POOL).map(String::from), &config.audit)
        })
    }

    /// Like `new`, with a caller-built audit logger (e.g. one with a manual clock).
    pub fn with_audit(
        config: AppConfig,
        catalog: SchemaCatalog,
        registry: Arc<PoolRegistry>,
        audit: impl FnOnce(&AppConfig) -> AuditLogger,
    ) -> Result<Self, AuthError> {
        let sessions = SessionKeys::from_config(&config)?;
        let audit = audit(&config);
        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            registry,
            mock: Arc::new(MockStore::new()),
            audit: Arc::new(audit),
            sessions: Arc::new(sessions),
            users: Arc::new(UserDirectory::seeded()),
        })
    }

    /// Resolves the descriptor's pool.
    pub async fn backend_for(&self, descriptor: &SchemaDescriptor) -> Result<Backend, DatabaseError> {
        self.backend_for_pool(&descriptor.db_pool).await
    }

    /// Resolves a named pool. An unconfigured pool falls back to the mock
    /// store outside production.
    pub async fn backend_for_pool(&self, name: &str) -> Result<Backend, DatabaseError> {
        match self.registry.resolve(name, self.config.pool_url(name)).await {
            Ok(pool) => Ok(Backend::Pool(pool)),
            Err(DatabaseError::ConfigMissing(pool)) if !self.config.is_production() => {
                warn!(pool = %pool, "{}_DB_URL not set, serving mock data", pool);
                Ok(Backend::Mock(self.mock.database_for(&pool, &self.catalog)))
            }
            Err(e) => Err(e),
        }
    }

    /// Converts an error for the client, hiding the cause in production.
    pub fn reject(&self, err: impl Into<ApiError>) -> ApiError {
        err.into().redact(self.config.is_production())
    }
}
