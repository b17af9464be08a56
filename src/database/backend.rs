use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::DatabaseError;
use super::statement::Statement;

/// A result row as an ordered JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// A resolved, shareable database handle.
pub type Pool = Arc<dyn Database>;

/// Executes typed statements against one logical database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Short backend label used in logs (`postgres`, `memory`).
    fn backend(&self) -> &'static str;

    /// Runs a statement and returns its rows. Only meaningful for `SELECT`.
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, DatabaseError>;

    /// Runs a mutation and returns the affected row count.
    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn close(&self);
}
