//! In-memory backend.
//!
//! Interprets typed statements against per-table row vectors with the same
//! comparison rules the Postgres backend relies on (SQL null semantics,
//! numeric comparison for numbers, chronological comparison for RFC 3339
//! strings). Backs the non-production mock collections and the test suite.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::backend::{Database, Pool, Row};
use super::registry::Connector;
use super::error::DatabaseError;
use super::statement::{Ident, Param, Statement, StatementKind};
use crate::filter::{CompareOp, Condition, OrderBy, SortDirection};

#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    executed: Mutex<Vec<Statement>>,
    statements: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of statements run so far, including failed ones.
    pub fn statement_count(&self) -> usize {
        self.statements.load(AtomicOrdering::SeqCst)
    }

    /// Every statement run so far, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Makes every subsequent call fail with a query error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Seeds `table` with `rows` unless the table already exists.
    pub fn seed_once(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> bool {
        let Ok(mut tables) = self.tables.lock() else {
            return false;
        };
        if tables.contains_key(table) {
            return false;
        }
        tables.insert(table.to_string(), rows.into_iter().collect());
        true
    }

    pub fn insert_row(&self, table: &str, row: Row) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.entry(table.to_string()).or_default().push(row);
        }
    }

    /// Snapshot of a table's rows in storage order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    fn begin(&self, statement: &Statement) -> Result<(), DatabaseError> {
        self.statements.fetch_add(1, AtomicOrdering::SeqCst);
        if let Ok(mut log) = self.executed.lock() {
            log.push(statement.clone());
        }
        debug!(table = %statement.table(), query = %statement.to_sql().query, "executing statement (memory)");
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(DatabaseError::QueryError("memory backend is set to fail".to_string()));
        }
        Ok(())
    }

    fn run(&self, statement: &Statement) -> Result<(Vec<Row>, u64), DatabaseError> {
        self.begin(statement)?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| DatabaseError::QueryError("memory backend lock poisoned".to_string()))?;

        match statement.kind() {
            StatementKind::Select { table, columns, conditions, order } => {
                let mut rows: Vec<Row> = tables
                    .get(table.as_str())
                    .map(|rows| rows.iter().filter(|r| matches_all(r, conditions)).cloned().collect())
                    .unwrap_or_default();
                sort_rows(&mut rows, order);
                if !columns.is_empty() {
                    rows = rows.iter().map(|row| project(row, columns)).collect();
                }
                let count = rows.len() as u64;
                Ok((rows, count))
            }
            StatementKind::Insert { table, columns, values } => {
                let row: Row = columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.as_str().to_string(), value.to_json()))
                    .collect();
                tables.entry(table.as_str().to_string()).or_default().push(row);
                Ok((vec![], 1))
            }
            StatementKind::Update { table, assignments, conditions } => {
                let mut affected = 0;
                if let Some(rows) = tables.get_mut(table.as_str()) {
                    for row in rows.iter_mut().filter(|r| matches_all(r, conditions)) {
                        for (column, value) in assignments {
                            row.insert(column.as_str().to_string(), value.to_json());
                        }
                        affected += 1;
                    }
                }
                Ok((vec![], affected))
            }
            StatementKind::Delete { table, conditions } => {
                let mut affected = 0;
                if let Some(rows) = tables.get_mut(table.as_str()) {
                    let before = rows.len();
                    rows.retain(|r| !matches_all(r, conditions));
                    affected = (before - rows.len()) as u64;
                }
                Ok((vec![], affected))
            }
        }
    }
}

/// Connector handing out one shared `MemoryDatabase` per pool name.
#[derive(Default)]
pub struct MemoryConnector {
    databases: Mutex<HashMap<String, Arc<MemoryDatabase>>>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The database behind `pool_name`, created on first use.
    pub fn database(&self, pool_name: &str) -> Arc<MemoryDatabase> {
        match self.databases.lock() {
            Ok(mut databases) => databases.entry(pool_name.to_string()).or_default().clone(),
            Err(_) => Arc::new(MemoryDatabase::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, pool_name: &str, _connection_string: &str) -> Result<Pool, DatabaseError> {
        self.connects.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.database(pool_name))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, DatabaseError> {
        self.run(statement).map(|(rows, _)| rows)
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        self.run(statement).map(|(_, affected)| affected)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(DatabaseError::QueryError("memory backend is set to fail".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {}
}

fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| matches(row, c))
}

fn matches(row: &Row, condition: &Condition) -> bool {
    let actual = row.get(condition.column.as_str()).unwrap_or(&Value::Null);
    let operand = condition.value.to_json();
    match (&condition.op, &condition.value) {
        (CompareOp::Eq, Param::Null(_)) => actual.is_null(),
        (CompareOp::Ne, Param::Null(_)) => !actual.is_null(),
        (op, _) => op.accepts(compare(actual, &operand)),
    }
}

/// SQL-style comparison: anything against null is unknown (`None`).
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.trim().parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.trim().parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|ts| ts.with_timezone(&Utc))
}

fn project(row: &Row, columns: &[Ident]) -> Row {
    columns
        .iter()
        .map(|c| (c.as_str().to_string(), row.get(c.as_str()).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Stable multi-key sort; nulls sort last ascending and first descending, as in Postgres.
fn sort_rows(rows: &mut [Row], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for term in order {
            let x = a.get(term.column.as_str()).unwrap_or(&Value::Null);
            let y = b.get(term.column.as_str()).unwrap_or(&Value::Null);
            let ordering = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ordering = match term.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
