//! Schema descriptors.
//!
//! A descriptor declares one managed entity: where it is mounted, which
//! relation and pool it lives in, its fields, the permissions guarding each
//! operation and the metadata columns the mapper maintains. Descriptors are
//! validated once at load time; everything downstream trusts them.

pub mod catalog;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::is_pool_name;
use crate::database::Ident;
use crate::filter::{FilterOrder, FilterWhere};
use crate::types::Operation;

pub use catalog::SchemaCatalog;

/// Path prefixes owned by the service itself.
const RESERVED_ENDPOINTS: &[&str] = &["/api/auth", "/api/schemas", "/api/users", "/api/lookups"];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema '{slug}': {message}")]
    Invalid { slug: String, message: String },

    #[error("Duplicate {what} '{value}'")]
    Duplicate { what: &'static str, value: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Select,
    MultiSelect,
    Checkbox,
    Date,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_list: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupSource>,
}

/// Table a select field draws its options from, served by `GET /api/lookups/:slug/:field`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSource {
    /// Defaults to the descriptor's own pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_pool: Option<String>,
    pub table: String,
    pub value_field: String,
    /// Defaults to `valueField`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// Permission strings per operation. `read` guards the whole route; an absent
/// mutation permission means the operation is not offered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl Permissions {
    pub fn for_operation(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::List => self.read.as_deref(),
            Operation::Create => self.create.as_deref(),
            Operation::Update => self.update.as_deref(),
            Operation::Delete => self.delete.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteType {
    #[default]
    Hard,
    Soft,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_field: Option<String>,
    #[serde(default)]
    pub delete_type: DeleteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub title: String,
    pub slug: String,
    pub endpoint: String,
    pub table_name: String,
    pub db_pool: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub metadata_config: MetadataConfig,
    #[serde(default, skip_serializing)]
    pub mock_rows: Vec<serde_json::Map<String, Value>>,
}

impl SchemaDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.primary)
    }

    pub fn is_primary(&self, name: &str) -> bool {
        self.field(name).map(|f| f.primary).unwrap_or(false)
    }

    /// Whether `name` is a metadata column the mapper writes itself.
    pub fn is_metadata_column(&self, name: &str) -> bool {
        let meta = &self.metadata_config;
        meta.updated_by_field.as_deref() == Some(name) || meta.last_action_field.as_deref() == Some(name)
    }

    /// Whether the operation is mounted at all.
    pub fn offers(&self, operation: Operation) -> bool {
        match operation {
            Operation::List => true,
            _ => self.permissions.for_operation(operation).is_some(),
        }
    }

    pub fn offered_operations(&self) -> Vec<Operation> {
        Operation::ALL.iter().copied().filter(|op| self.offers(*op)).collect()
    }

    /// Pool a lookup reads from.
    pub fn lookup_pool<'a>(&'a self, lookup: &'a LookupSource) -> &'a str {
        lookup.db_pool.as_deref().unwrap_or(&self.db_pool)
    }

    fn validate_lookup(&self, lookup: &LookupSource) -> Result<(), String> {
        if !is_pool_name(self.lookup_pool(lookup)) {
            return Err(format!("dbPool '{}' must match [A-Z0-9_]+", self.lookup_pool(lookup)));
        }
        for column in [Some(&lookup.table), Some(&lookup.value_field), lookup.label_field.as_ref()].into_iter().flatten() {
            Ident::new(column.as_str()).map_err(|e| e.to_string())?;
        }
        if let Some(filter) = &lookup.filter {
            FilterWhere::parse(filter).map_err(|e| format!("filter: {}", e))?;
        }
        Ok(())
    }

    /// Checks every invariant the mapper and router rely on.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |message: String| SchemaError::Invalid { slug: self.slug.clone(), message };

        if self.slug.is_empty() || !self.slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(invalid(format!("slug '{}' must be lower-case kebab-case", self.slug)));
        }
        if !self.endpoint.starts_with("/api/") || self.endpoint.contains([':', '*']) || self.endpoint.ends_with('/') {
            return Err(invalid(format!("endpoint '{}' must be a static path under /api/", self.endpoint)));
        }
        if RESERVED_ENDPOINTS.iter().any(|r| self.endpoint == *r || self.endpoint.starts_with(&format!("{}/", r))) {
            return Err(invalid(format!("endpoint '{}' is reserved", self.endpoint)));
        }
        Ident::new(self.table_name.as_str()).map_err(|e| invalid(format!("tableName: {}", e)))?;
        if !is_pool_name(&self.db_pool) {
            return Err(invalid(format!("dbPool '{}' must match [A-Z0-9_]+", self.db_pool)));
        }
        if self.fields.is_empty() {
            return Err(invalid("at least one field is required".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            Ident::new(field.name.as_str()).map_err(|e| invalid(format!("field: {}", e)))?;
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
            let is_select = matches!(field.kind, FieldKind::Select | FieldKind::MultiSelect);
            if field.options.is_some() && !is_select {
                return Err(invalid(format!("field '{}' declares options but is not a select", field.name)));
            }
            if let Some(lookup) = &field.lookup {
                if !is_select || field.options.is_some() {
                    return Err(invalid(format!("field '{}': lookup requires a select without static options", field.name)));
                }
                self.validate_lookup(lookup).map_err(|message| invalid(format!("field '{}' lookup: {}", field.name, message)))?;
            }
        }

        let meta = &self.metadata_config;
        for (label, column) in [
            ("updatedByField", &meta.updated_by_field),
            ("lastActionField", &meta.last_action_field),
            ("rangeField", &meta.range_field),
        ] {
            if let Some(column) = column {
                Ident::new(column.as_str()).map_err(|e| invalid(format!("{}: {}", label, e)))?;
            }
        }
        for (label, column) in [("updatedByField", &meta.updated_by_field), ("lastActionField", &meta.last_action_field)] {
            if let Some(column) = column.as_deref().filter(|c| self.field(c).is_some()) {
                return Err(invalid(format!("{} '{}' collides with a declared field", label, column)));
            }
        }
        if meta.updated_by_field.is_some() && meta.updated_by_field == meta.last_action_field {
            return Err(invalid("updatedByField and lastActionField must differ".to_string()));
        }
        if meta.delete_type == DeleteType::Soft && meta.last_action_field.is_none() {
            return Err(invalid("soft delete requires lastActionField".to_string()));
        }
        if let Some(filter) = &meta.list_filter {
            FilterWhere::parse(filter).map_err(|e| invalid(format!("listFilter: {}", e)))?;
        }
        if let Some(order) = &meta.order_by {
            FilterOrder::parse(order).map_err(|e| invalid(format!("orderBy: {}", e)))?;
        }

        let needs_key = self.offers(Operation::Update) || self.offers(Operation::Delete);
        if needs_key && self.primary_fields().next().is_none() {
            return Err(invalid("update and delete require at least one primary field".to_string()));
        }
        Ok(())
    }
}
