//! Option lists for select fields backed by another table.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use super::MapperError;
use crate::database::{Database, Ident, Statement};
use crate::filter::{FilterWhere, OrderBy, SortDirection};
use crate::schema::LookupSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupOption {
    pub value: Value,
    pub label: Value,
}

/// `SELECT value[, label] FROM table [WHERE filter] ORDER BY label`
pub fn lookup_statement(source: &LookupSource) -> Result<Statement, MapperError> {
    let value = Ident::new(source.value_field.as_str())?;
    let label = Ident::new(label_field(source))?;
    let conditions = match &source.filter {
        Some(filter) => FilterWhere::parse(filter)?,
        None => vec![],
    };

    let mut columns = vec![value.clone()];
    if label != value {
        columns.push(label.clone());
    }
    let order = vec![OrderBy { column: label, sort: SortDirection::Asc }];
    Ok(Statement::projection(Ident::new(source.table.as_str())?, columns, conditions, order))
}

/// Distinct, non-null options in label order.
pub async fn fetch_options(database: &dyn Database, source: &LookupSource) -> Result<Vec<LookupOption>, MapperError> {
    let rows = database.fetch_all(&lookup_statement(source)?).await?;
    let mut seen = HashSet::new();
    let mut options = Vec::new();
    for row in rows {
        let value = match row.get(&source.value_field) {
            Some(value) if !value.is_null() => value.clone(),
            _ => continue,
        };
        if !seen.insert(value.to_string()) {
            continue;
        }
        let label = row.get(label_field(source)).filter(|l| !l.is_null()).cloned().unwrap_or_else(|| value.clone());
        options.push(LookupOption { value, label });
    }
    Ok(options)
}

fn label_field(source: &LookupSource) -> &str {
    source.label_field.as_deref().unwrap_or(&source.value_field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use serde_json::json;

    fn source(value: Value) -> LookupSource {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn statement_projects_value_and_label() {
        let src = source(json!({
            "table": "gtp_mccmnc_mappings",
            "valueField": "mcc",
            "labelField": "operator_name",
            "filter": { "last_action": { "$ne": "D" } }
        }));
        let sql = lookup_statement(&src).unwrap().to_sql();
        assert_eq!(
            sql.query,
            "SELECT \"mcc\", \"operator_name\" FROM \"gtp_mccmnc_mappings\" WHERE \"last_action\" <> $1 ORDER BY \"operator_name\" ASC"
        );
    }

    #[tokio::test]
    async fn options_are_distinct_and_skip_nulls() {
        let db = MemoryDatabase::new();
        for (name, region) in [("Range-002", json!("south")), ("Range-001", json!(null)), ("Range-002", json!("south")), ("", json!("x"))] {
            let row = json!({ "imsirange_name": if name.is_empty() { json!(null) } else { json!(name) }, "region": region });
            db.insert_row("gtp_imsi_ranges", row.as_object().cloned().unwrap());
        }

        let src = source(json!({ "table": "gtp_imsi_ranges", "valueField": "imsirange_name" }));
        let options = fetch_options(&db, &src).await.unwrap();
        assert_eq!(
            options,
            vec![
                LookupOption { value: json!("Range-001"), label: json!("Range-001") },
                LookupOption { value: json!("Range-002"), label: json!("Range-002") },
            ]
        );

        let labelled = source(json!({ "table": "gtp_imsi_ranges", "valueField": "imsirange_name", "labelField": "region" }));
        let options = fetch_options(&db, &labelled).await.unwrap();
        assert_eq!(options.len(), 2);
        assert!(options.contains(&LookupOption { value: json!("Range-001"), label: json!("Range-001") }));
    }
}
