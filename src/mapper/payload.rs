//! Request payload checks shared by the mapper operations.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::types::BigDecimal;

use super::MapperError;
use crate::database::{Param, SqlType};
use crate::schema::{FieldDescriptor, FieldKind, SchemaDescriptor};

/// Key carrying the record identity on update and delete payloads.
pub const IDENTIFIERS_KEY: &str = "_identifiers";

pub fn as_object(value: Value) -> Result<Map<String, Value>, MapperError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MapperError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Missing, null, empty string and empty array all count as blank.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Column type a field kind binds as.
pub fn sql_type(kind: FieldKind) -> SqlType {
    match kind {
        FieldKind::Text | FieldKind::Email | FieldKind::Select => SqlType::Text,
        FieldKind::Number => SqlType::Numeric,
        FieldKind::Checkbox => SqlType::Bool,
        FieldKind::Date => SqlType::Date,
        FieldKind::MultiSelect => SqlType::Json,
    }
}

/// Checks the value against the field's declared kind and converts it to the
/// parameter it binds as. Blank values become typed nulls, except that text
/// kinds keep an empty string and multi-selects keep an empty list.
/// Required-ness is checked separately.
pub fn field_param(field: &FieldDescriptor, value: &Value) -> Result<Param, MapperError> {
    let invalid = |message: &str| MapperError::InvalidValue { field: field.name.clone(), message: message.to_string() };
    let null = Param::Null(sql_type(field.kind));
    match (field.kind, value) {
        (_, Value::Null) => return Ok(null),
        (FieldKind::MultiSelect, Value::Array(items)) if items.is_empty() => return Ok(Param::Json(value.clone())),
        (_, Value::Array(items)) if items.is_empty() => return Ok(null),
        (FieldKind::Text | FieldKind::Email | FieldKind::Select, Value::String(s)) if s.trim().is_empty() => {
            return Ok(Param::Text(s.clone()))
        }
        (_, Value::String(s)) if s.trim().is_empty() => return Ok(null),
        _ => {}
    }
    match field.kind {
        FieldKind::Text => match value {
            Value::String(s) => Ok(Param::Text(s.clone())),
            Value::Number(n) => Ok(Param::Text(n.to_string())),
            _ => Err(invalid("expected text")),
        },
        FieldKind::Number => {
            let text = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                _ => return Err(invalid("expected a number")),
            };
            BigDecimal::from_str(&text)
                .map(Param::Numeric)
                .map_err(|_| invalid("expected a number"))
        }
        FieldKind::Email => match value.as_str() {
            Some(s) if is_email(s) => Ok(Param::Text(s.to_string())),
            _ => Err(invalid("expected an email address")),
        },
        FieldKind::Checkbox => match value {
            Value::Bool(b) => Ok(Param::Bool(*b)),
            _ => Err(invalid("expected true or false")),
        },
        FieldKind::Date => {
            let parsed = value.as_str().and_then(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Param::Date)
                    .or_else(|_| DateTime::parse_from_rfc3339(s).map(|ts| Param::Timestamp(ts.with_timezone(&Utc))))
                    .ok()
            });
            parsed.ok_or_else(|| invalid("expected a date (YYYY-MM-DD or RFC 3339)"))
        }
        FieldKind::Select => match value.as_str() {
            Some(s) if allowed(field, s) => Ok(Param::Text(s.to_string())),
            Some(_) => Err(invalid("value is not one of the declared options")),
            None => Err(invalid("expected a single option")),
        },
        FieldKind::MultiSelect => match value {
            Value::Array(items) => {
                for item in items {
                    match item.as_str() {
                        Some(s) if allowed(field, s) => {}
                        Some(_) => return Err(invalid("value is not one of the declared options")),
                        None => return Err(invalid("expected a list of options")),
                    }
                }
                Ok(Param::Json(value.clone()))
            }
            _ => Err(invalid("expected a list of options")),
        },
    }
}

/// Splits `{ "_identifiers": {...}, ...fields }`.
pub fn split_identifiers(mut body: Map<String, Value>) -> Result<(Option<Map<String, Value>>, Map<String, Value>), MapperError> {
    match body.remove(IDENTIFIERS_KEY) {
        None => Ok((None, body)),
        Some(Value::Object(identifiers)) => Ok((Some(identifiers), body)),
        Some(other) => Err(MapperError::InvalidPayload(format!(
            "{} must be an object, got {}",
            IDENTIFIERS_KEY,
            type_name(&other)
        ))),
    }
}

/// Validates an identifier mapping: only primary fields, every primary field present.
/// Returns the pairs in descriptor order.
pub fn checked_identifiers(
    descriptor: &SchemaDescriptor,
    identifiers: &Map<String, Value>,
) -> Result<Vec<(String, Value)>, MapperError> {
    if let Some(key) = identifiers.keys().find(|k| !descriptor.is_primary(k)) {
        return Err(MapperError::NotAnIdentifier(key.clone()));
    }
    let mut pairs = Vec::new();
    let mut missing = Vec::new();
    for field in descriptor.primary_fields() {
        match identifiers.get(&field.name) {
            Some(value) if !is_blank(Some(value)) && !value.is_array() && !value.is_object() => {
                field_param(field, value)?;
                pairs.push((field.name.clone(), value.clone()));
            }
            _ => missing.push(field.name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(MapperError::MissingIdentifiers(missing));
    }
    Ok(pairs)
}

/// `a=1, b=2` summary for audit details.
pub fn describe(pairs: &[(String, Value)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn allowed(field: &FieldDescriptor, value: &str) -> bool {
    field.options.as_ref().map(|options| options.iter().any(|o| o == value)).unwrap_or(true)
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !s.contains(char::is_whitespace),
        None => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
