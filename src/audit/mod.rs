//! Audit trail.
//!
//! Security and data-mutation events are appended to `audit_logs` on the
//! `CORE` pool. Writing is best effort: `record` reports what happened as an
//! [`AuditOutcome`] and never fails the caller.

pub mod clock;
pub mod retention;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::{AuditConfig, RetentionMode};
use crate::database::{DatabaseError, Ident, Param, Pool, PoolRegistry, Statement};
use crate::types::Operation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use retention::spawn_retention_sweeper;

pub const AUDIT_POOL: &str = "CORE";
pub const AUDIT_TABLE: &str = "audit_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "Login")]
    Login,
    #[serde(rename = "Logout")]
    Logout,
    #[serde(rename = "Data Insert")]
    DataInsert,
    #[serde(rename = "Data Update")]
    DataUpdate,
    #[serde(rename = "Data Delete")]
    DataDelete,
    #[serde(rename = "Login Failed")]
    LoginFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "Login",
            AuditAction::Logout => "Logout",
            AuditAction::DataInsert => "Data Insert",
            AuditAction::DataUpdate => "Data Update",
            AuditAction::DataDelete => "Data Delete",
            AuditAction::LoginFailed => "Login Failed",
        }
    }

    pub fn for_operation(operation: Operation) -> Option<Self> {
        match operation {
            Operation::List => None,
            Operation::Create => Some(AuditAction::DataInsert),
            Operation::Update => Some(AuditAction::DataUpdate),
            Operation::Delete => Some(AuditAction::DataDelete),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Success,
    Fail,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "Success",
            AuditStatus::Fail => "Fail",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub username: String,
    pub ip_address: Option<String>,
    pub screen: Option<String>,
    pub action: AuditAction,
    pub details: Option<String>,
    pub status: AuditStatus,
}

impl AuditEntry {
    pub fn new(username: impl Into<String>, action: AuditAction) -> Self {
        Self {
            username: username.into(),
            ip_address: None,
            screen: None,
            action,
            details: None,
            status: AuditStatus::Success,
        }
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.status = AuditStatus::Fail;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Written,
    /// No audit pool is configured.
    Skipped,
    Failed(String),
}

pub struct AuditLogger {
    registry: Arc<PoolRegistry>,
    connection_string: Option<String>,
    clock: Arc<dyn Clock>,
    retention_days: i64,
    mode: RetentionMode,
}

impl AuditLogger {
    pub fn new(registry: Arc<PoolRegistry>, connection_string: Option<String>, config: &AuditConfig) -> Self {
        Self {
            registry,
            connection_string,
            clock: Arc::new(SystemClock),
            retention_days: config.retention_days,
            mode: config.mode,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.connection_string.is_some()
    }

    pub fn mode(&self) -> RetentionMode {
        self.mode
    }

    /// Appends one entry. Inline retention, when enabled, runs after the insert.
    pub async fn record(&self, entry: AuditEntry) -> AuditOutcome {
        let pool = match self.pool().await {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                warn!(action = entry.action.as_str(), "CORE_DB_URL not set, skipping audit log");
                return AuditOutcome::Skipped;
            }
            Err(e) => return self.failed(&entry, e),
        };

        let insert = match self.insert_statement(&entry) {
            Ok(statement) => statement,
            Err(e) => return self.failed(&entry, e),
        };
        if let Err(e) = pool.execute(&insert).await {
            return self.failed(&entry, e);
        }

        if self.mode == RetentionMode::Inline {
            if let Err(e) = self.prune_on(&pool).await {
                error!(error = %e, "Audit retention prune failed");
            }
        }
        AuditOutcome::Written
    }

    /// Deletes entries older than the retention window. Returns the number removed.
    pub async fn prune(&self) -> Result<u64, DatabaseError> {
        match self.pool().await? {
            Some(pool) => self.prune_on(&pool).await,
            None => Err(DatabaseError::ConfigMissing(AUDIT_POOL.to_string())),
        }
    }

    async fn prune_on(&self, pool: &Pool) -> Result<u64, DatabaseError> {
        match retention::cutoff(self.clock.now(), self.retention_days) {
            Some(cutoff) => pool.execute(&retention::prune_statement(cutoff)?).await,
            None => Ok(0),
        }
    }

    async fn pool(&self) -> Result<Option<Pool>, DatabaseError> {
        match &self.connection_string {
            Some(url) => self.registry.resolve(AUDIT_POOL, Some(url.as_str())).await.map(Some),
            None => Ok(None),
        }
    }

    fn insert_statement(&self, entry: &AuditEntry) -> Result<Statement, DatabaseError> {
        Statement::insert(
            Ident::new(AUDIT_TABLE)?,
            vec![
                (Ident::new("username")?, Param::from(entry.username.clone())),
                (Ident::new("ip_address")?, Param::from(entry.ip_address.clone())),
                (Ident::new("screen")?, Param::from(entry.screen.clone())),
                (Ident::new("action")?, Param::from(entry.action.as_str())),
                (Ident::new("details")?, Param::from(entry.details.clone())),
                (Ident::new("status")?, Param::from(entry.status.as_str())),
                (Ident::new("timestamp")?, Param::from(self.clock.now())),
            ],
        )
    }

    fn failed(&self, entry: &AuditEntry, e: DatabaseError) -> AuditOutcome {
        error!(action = entry.action.as_str(), username = %entry.username, error = %e, "Failed to write audit log");
        AuditOutcome::Failed(e.to_string())
    }
}
