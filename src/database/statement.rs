//! Typed SQL statements.
//!
//! Every statement the service runs is built here from validated identifiers
//! and bound parameters, then rendered to Postgres text (`$1`, `$2`, ...).
//! Values never reach the query text.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};
use sqlx::types::BigDecimal;

use super::error::DatabaseError;
use crate::filter::{CompareOp, Condition, OrderBy};

/// Postgres truncates identifiers longer than this.
const MAX_IDENT_LEN: usize = 63;

/// A validated SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`), rendered double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(DatabaseError::InvalidIdentifier(name))
        }
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        name.len() <= MAX_IDENT_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postgres type a parameter is bound as. Carried by nulls so a missing
/// value still binds with the column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Numeric,
    Bool,
    Date,
    Timestamp,
    Json,
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null(SqlType),
    Text(String),
    Numeric(BigDecimal),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Structured values (multi-select lists) bound as `jsonb`.
    Json(Value),
}

impl Param {
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null(_))
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Param::Null(ty) => *ty,
            Param::Text(_) => SqlType::Text,
            Param::Numeric(_) => SqlType::Numeric,
            Param::Bool(_) => SqlType::Bool,
            Param::Date(_) => SqlType::Date,
            Param::Timestamp(_) => SqlType::Timestamp,
            Param::Json(_) => SqlType::Json,
        }
    }

    /// JSON view of the parameter, as returned to clients and stored by the memory backend.
    pub fn to_json(&self) -> Value {
        match self {
            Param::Null(_) => Value::Null,
            Param::Text(s) => Value::String(s.clone()),
            Param::Numeric(d) => numeric_to_json(d),
            Param::Bool(b) => Value::Bool(*b),
            Param::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Param::Timestamp(ts) => Value::String(format_timestamp(ts)),
            Param::Json(v) => v.clone(),
        }
    }
}

/// Untyped JSON maps onto the closest SQL type: strings bind as text,
/// numbers as numeric, arrays and objects as jsonb.
impl From<Value> for Param {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Param::Null(SqlType::Text),
            Value::Bool(b) => Param::Bool(b),
            Value::Number(n) => match BigDecimal::from_str(&n.to_string()) {
                Ok(d) => Param::Numeric(d),
                Err(_) => Param::Text(n.to_string()),
            },
            Value::String(s) => Param::Text(s),
            other => Param::Json(other),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<Option<String>> for Param {
    fn from(value: Option<String>) -> Self {
        value.map(Param::Text).unwrap_or(Param::Null(SqlType::Text))
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(value: DateTime<Utc>) -> Self {
        Param::Timestamp(value)
    }
}

/// NUMERIC as a JSON number when it fits, otherwise as its decimal text.
pub fn numeric_to_json(d: &BigDecimal) -> Value {
    let text = d.normalized().to_string();
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

/// Canonical timestamp text: RFC 3339, microsecond precision, `Z` suffix.
/// Fixed width, so lexical order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Select {
        table: Ident,
        /// Empty selects every column.
        columns: Vec<Ident>,
        conditions: Vec<Condition>,
        order: Vec<OrderBy>,
    },
    Insert {
        table: Ident,
        columns: Vec<Ident>,
        values: Vec<Param>,
    },
    Update {
        table: Ident,
        assignments: Vec<(Ident, Param)>,
        conditions: Vec<Condition>,
    },
    Delete {
        table: Ident,
        conditions: Vec<Condition>,
    },
}

/// A single statement. Only constructible through the checked constructors,
/// so an `UPDATE` or `DELETE` always carries a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
}

impl Statement {
    pub fn select(table: Ident, conditions: Vec<Condition>, order: Vec<OrderBy>) -> Self {
        Self::projection(table, vec![], conditions, order)
    }

    /// `SELECT` limited to `columns`.
    pub fn projection(table: Ident, columns: Vec<Ident>, conditions: Vec<Condition>, order: Vec<OrderBy>) -> Self {
        Self { kind: StatementKind::Select { table, columns, conditions, order } }
    }

    pub fn insert(table: Ident, row: Vec<(Ident, Param)>) -> Result<Self, DatabaseError> {
        if row.is_empty() {
            return Err(DatabaseError::UnboundedStatement("INSERT", "columns"));
        }
        let (columns, values) = row.into_iter().unzip();
        Ok(Self { kind: StatementKind::Insert { table, columns, values } })
    }

    pub fn update(
        table: Ident,
        assignments: Vec<(Ident, Param)>,
        conditions: Vec<Condition>,
    ) -> Result<Self, DatabaseError> {
        if assignments.is_empty() {
            return Err(DatabaseError::UnboundedStatement("UPDATE", "assignments"));
        }
        if conditions.is_empty() {
            return Err(DatabaseError::UnboundedStatement("UPDATE", "a WHERE clause"));
        }
        Ok(Self { kind: StatementKind::Update { table, assignments, conditions } })
    }

    pub fn delete(table: Ident, conditions: Vec<Condition>) -> Result<Self, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::UnboundedStatement("DELETE", "a WHERE clause"));
        }
        Ok(Self { kind: StatementKind::Delete { table, conditions } })
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn table(&self) -> &Ident {
        match &self.kind {
            StatementKind::Select { table, .. }
            | StatementKind::Insert { table, .. }
            | StatementKind::Update { table, .. }
            | StatementKind::Delete { table, .. } => table,
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = Vec::new();
        let query = match &self.kind {
            StatementKind::Select { table, columns, conditions, order } => {
                let projection = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns.iter().map(Ident::quoted).collect::<Vec<_>>().join(", ")
                };
                let mut query = format!("SELECT {} FROM {}", projection, table.quoted());
                if !conditions.is_empty() {
                    query.push_str(" WHERE ");
                    query.push_str(&where_clause(conditions, &mut params));
                }
                if !order.is_empty() {
                    let terms: Vec<String> = order
                        .iter()
                        .map(|o| format!("{} {}", o.column.quoted(), o.sort.to_sql()))
                        .collect();
                    query.push_str(" ORDER BY ");
                    query.push_str(&terms.join(", "));
                }
                query
            }
            StatementKind::Insert { table, columns, values } => {
                let column_list: Vec<String> = columns.iter().map(Ident::quoted).collect();
                let placeholders: Vec<String> = values.iter().map(|v| param(&mut params, v)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table.quoted(),
                    column_list.join(", "),
                    placeholders.join(", ")
                )
            }
            StatementKind::Update { table, assignments, conditions } => {
                // SET parameters are numbered before WHERE parameters
                let set: Vec<String> = assignments
                    .iter()
                    .map(|(column, value)| format!("{} = {}", column.quoted(), param(&mut params, value)))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    table.quoted(),
                    set.join(", "),
                    where_clause(conditions, &mut params)
                )
            }
            StatementKind::Delete { table, conditions } => {
                format!("DELETE FROM {} WHERE {}", table.quoted(), where_clause(conditions, &mut params))
            }
        };
        SqlResult { query, params }
    }
}

fn where_clause(conditions: &[Condition], params: &mut Vec<Param>) -> String {
    conditions
        .iter()
        .map(|c| match (&c.op, &c.value) {
            (CompareOp::Eq, Param::Null(_)) => format!("{} IS NULL", c.column.quoted()),
            (CompareOp::Ne, Param::Null(_)) => format!("{} IS NOT NULL", c.column.quoted()),
            (op, value) => format!("{} {} {}", c.column.quoted(), op.to_sql(), param(params, value)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn param(params: &mut Vec<Param>, value: &Param) -> String {
    params.push(value.clone());
    format!("${}", params.len())
}
