//! Generic persistence mapper.
//!
//! Turns a schema descriptor plus a request payload into exactly one typed
//! statement, runs it on the resolved backend and appends the matching audit
//! entry. Validation happens before any statement is built, so a rejected
//! payload never reaches the database.

pub mod lookup;
pub mod payload;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::access::Actor;
use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::database::{Database, DatabaseError, Ident, Param, Row, Statement};
use crate::filter::{Condition, FilterError, FilterOrder, FilterWhere};
use crate::schema::{DeleteType, SchemaDescriptor};
use crate::types::Operation;

use payload::{as_object, checked_identifiers, describe, field_param, is_blank, split_identifiers};

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing identifiers: {}", .0.join(", "))]
    MissingIdentifiers(Vec<String>),

    #[error("Field '{0}' is not an identifier")]
    NotAnIdentifier(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("This resource does not support range queries")]
    RangeNotSupported,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl MapperError {
    /// Per-field messages for validation failures.
    pub fn field_errors(&self) -> Option<HashMap<String, String>> {
        let map = |fields: &[String], message: &str| -> HashMap<String, String> {
            fields.iter().map(|f| (f.clone(), message.to_string())).collect()
        };
        match self {
            MapperError::MissingRequired(fields) => Some(map(fields, "required")),
            MapperError::MissingIdentifiers(fields) => Some(map(fields, "identifier required")),
            MapperError::UnknownField(field) => Some(map(std::slice::from_ref(field), "unknown field")),
            MapperError::NotAnIdentifier(field) => Some(map(std::slice::from_ref(field), "not an identifier")),
            MapperError::InvalidValue { field, message } => Some(map(std::slice::from_ref(field), message)),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, MapperError::Database(_))
    }
}

/// Optional time bounds for `GET` on descriptors with a `rangeField`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeQuery {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

pub struct PersistenceMapper<'a> {
    descriptor: &'a SchemaDescriptor,
    database: &'a dyn Database,
    audit: &'a AuditLogger,
}

impl<'a> PersistenceMapper<'a> {
    pub fn new(descriptor: &'a SchemaDescriptor, database: &'a dyn Database, audit: &'a AuditLogger) -> Self {
        Self { descriptor, database, audit }
    }

    /// Builds the `SELECT` for a list request without running it.
    pub fn list_statement(&self, range: &RangeQuery) -> Result<Statement, MapperError> {
        let meta = &self.descriptor.metadata_config;
        let mut conditions = match &meta.list_filter {
            Some(filter) => FilterWhere::parse(filter)?,
            None => vec![],
        };
        if !range.is_empty() {
            let column = meta.range_field.as_deref().ok_or(MapperError::RangeNotSupported)?;
            conditions.extend(FilterWhere::range(&Ident::new(column)?, range.from, range.to));
        }
        let order = match &meta.order_by {
            Some(order) => FilterOrder::parse(order)?,
            None => vec![],
        };
        Ok(Statement::select(self.table()?, conditions, order))
    }

    pub async fn list(&self, range: &RangeQuery) -> Result<Vec<Row>, MapperError> {
        let statement = self.list_statement(range)?;
        Ok(self.database.fetch_all(&statement).await?)
    }

    /// Inserts one record and returns it as stored, metadata included.
    pub async fn create(&self, actor: &Actor, body: Value) -> Result<Row, MapperError> {
        let body = as_object(body)?;
        let mut row = self.checked_fields(body)?;

        let missing: Vec<String> = self
            .descriptor
            .fields
            .iter()
            .filter(|f| f.required && is_blank(row.get(&f.name)))
            .map(|f| f.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(MapperError::MissingRequired(missing));
        }

        self.inject_metadata(&mut row, actor, Operation::Create);
        let statement = Statement::insert(self.table()?, self.assignments(&row)?)?;

        let keys: Vec<(String, Value)> = self
            .descriptor
            .primary_fields()
            .filter_map(|f| row.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();
        let details = format!("Inserted into {}: {}", self.descriptor.table_name, describe(&keys));
        self.run(actor, Operation::Create, &statement, details).await?;
        Ok(row)
    }

    /// Applies `fields` to the record named by `_identifiers`. Returns identifiers merged with the applied fields.
    pub async fn update(&self, actor: &Actor, body: Value) -> Result<Row, MapperError> {
        let (identifiers, fields) = split_identifiers(as_object(body)?)?;
        let identifiers = identifiers.ok_or_else(|| self.all_identifiers_missing())?;
        let keys = checked_identifiers(self.descriptor, &identifiers)?;

        let mut fields = self.checked_fields(fields)?;
        let blank_required: Vec<String> = fields
            .iter()
            .filter(|(name, value)| {
                self.descriptor.field(name).map(|f| f.required).unwrap_or(false) && is_blank(Some(*value))
            })
            .map(|(name, _)| name.clone())
            .collect();
        if !blank_required.is_empty() {
            return Err(MapperError::MissingRequired(blank_required));
        }

        self.inject_metadata(&mut fields, actor, Operation::Update);
        if fields.is_empty() {
            return Err(MapperError::InvalidPayload("no fields to update".to_string()));
        }

        let statement = Statement::update(self.table()?, self.assignments(&fields)?, self.conditions(&keys)?)?;
        let changed: Vec<&str> = fields.keys().map(String::as_str).collect();
        let details = format!(
            "Updated {}: {} ({})",
            self.descriptor.table_name,
            describe(&keys),
            changed.join(", ")
        );
        self.run(actor, Operation::Update, &statement, details).await?;

        let mut data: Row = keys.into_iter().collect();
        data.extend(fields);
        Ok(data)
    }

    /// Removes, or soft-deletes, the record named by the body. The body is the
    /// identifier mapping itself or a `{"_identifiers": ...}` wrapper.
    pub async fn delete(&self, actor: &Actor, body: Value) -> Result<Row, MapperError> {
        let (wrapped, rest) = split_identifiers(as_object(body)?)?;
        let identifiers = match wrapped {
            Some(identifiers) => identifiers,
            None => self.identifiers_from_record(rest)?,
        };
        let keys = checked_identifiers(self.descriptor, &identifiers)?;
        let conditions = self.conditions(&keys)?;
        let mut applied: Row = keys.iter().cloned().collect();

        let (statement, details) = match self.descriptor.metadata_config.delete_type {
            DeleteType::Hard => (
                Statement::delete(self.table()?, conditions)?,
                format!("Deleted from {}: {}", self.descriptor.table_name, describe(&keys)),
            ),
            DeleteType::Soft => {
                let mut marks = Row::new();
                self.inject_metadata(&mut marks, actor, Operation::Delete);
                let statement = Statement::update(self.table()?, self.assignments(&marks)?, conditions)?;
                applied.extend(marks);
                (statement, format!("Soft-deleted in {}: {}", self.descriptor.table_name, describe(&keys)))
            }
        };
        self.run(actor, Operation::Delete, &statement, details).await?;
        Ok(applied)
    }

    async fn run(&self, actor: &Actor, operation: Operation, statement: &Statement, details: String) -> Result<u64, MapperError> {
        let result = self.database.execute(statement).await;
        let Some(action) = AuditAction::for_operation(operation) else {
            return Ok(result?);
        };
        let entry = AuditEntry::new(actor.username.clone(), action)
            .ip(actor.ip_address.clone())
            .screen(self.descriptor.title.clone());

        match result {
            Ok(affected) => {
                debug!(slug = %self.descriptor.slug, %operation, affected, backend = self.database.backend(), "Mutation applied");
                self.audit.record(entry.details(details)).await;
                Ok(affected)
            }
            Err(e) => {
                error!(slug = %self.descriptor.slug, %operation, error = %e, "Mutation failed");
                self.audit.record(entry.details(format!("{} ({})", details, e)).failed()).await;
                Err(e.into())
            }
        }
    }

    /// Drops metadata columns the mapper owns and rejects keys the descriptor does not declare.
    fn checked_fields(&self, body: Map<String, Value>) -> Result<Row, MapperError> {
        let mut row = Row::new();
        for (key, value) in body {
            match self.descriptor.field(&key) {
                Some(field) => {
                    field_param(field, &value)?;
                    row.insert(key, value);
                }
                None if self.descriptor.is_metadata_column(&key) => {}
                None => return Err(MapperError::UnknownField(key)),
            }
        }
        Ok(row)
    }

    fn identifiers_from_record(&self, record: Map<String, Value>) -> Result<Map<String, Value>, MapperError> {
        let mut identifiers = Map::new();
        for (key, value) in record {
            if self.descriptor.is_primary(&key) {
                identifiers.insert(key, value);
            } else if self.descriptor.field(&key).is_none() && !self.descriptor.is_metadata_column(&key) {
                return Err(MapperError::UnknownField(key));
            }
        }
        Ok(identifiers)
    }

    fn inject_metadata(&self, row: &mut Row, actor: &Actor, operation: Operation) {
        let meta = &self.descriptor.metadata_config;
        if let Some(column) = &meta.updated_by_field {
            row.insert(column.clone(), Value::String(actor.username.clone()));
        }
        if let (Some(column), Some(code)) = (&meta.last_action_field, operation.action_code()) {
            row.insert(column.clone(), Value::String(code.to_string()));
        }
    }

    fn all_identifiers_missing(&self) -> MapperError {
        MapperError::MissingIdentifiers(self.descriptor.primary_fields().map(|f| f.name.clone()).collect())
    }

    fn table(&self) -> Result<Ident, DatabaseError> {
        Ident::new(self.descriptor.table_name.as_str())
    }

    /// Binds declared fields by their kind. Metadata columns are text.
    fn param(&self, column: &str, value: &Value) -> Result<Param, MapperError> {
        match self.descriptor.field(column) {
            Some(field) => field_param(field, value),
            None => Ok(Param::from(value.clone())),
        }
    }

    fn assignments(&self, row: &Row) -> Result<Vec<(Ident, Param)>, MapperError> {
        row.iter()
            .map(|(k, v)| Ok((Ident::new(k.as_str())?, self.param(k, v)?)))
            .collect()
    }

    fn conditions(&self, keys: &[(String, Value)]) -> Result<Vec<Condition>, MapperError> {
        keys.iter()
            .map(|(k, v)| Ok(Condition::eq(Ident::new(k.as_str())?, self.param(k, v)?)))
            .collect()
    }
}
