use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::FilterError;
use super::types::{CompareOp, Condition};
use crate::database::statement::{Ident, Param};

/// Parses the declarative filter objects carried by schema descriptors
/// (`metadataConfig.listFilter`) into bound conditions.
///
/// Accepted shapes:
/// - `{ "column": value }` (implicit equality)
/// - `{ "column": { "$gte": value, "$lt": value } }`
///
/// Raw SQL strings and logical operators are rejected; every value ends up
/// as a bound parameter.
pub struct FilterWhere;

impl FilterWhere {
    pub fn parse(where_data: &Value) -> Result<Vec<Condition>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut conditions = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        return Err(FilterError::UnsupportedOperator(key.clone()));
                    }
                    Self::parse_field_condition(key, value, &mut conditions)?;
                }
                Ok(conditions)
            }
            Value::String(_) => Err(FilterError::InvalidWhereClause(
                "Raw SQL filters are not supported".to_string(),
            )),
            _ => Err(FilterError::InvalidWhereClause("Filter must be an object".to_string())),
        }
    }

    /// Inclusive time range on `column`; either bound may be open.
    pub fn range(column: &Ident, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if let Some(from) = from {
            conditions.push(Condition::new(column.clone(), CompareOp::Gte, from));
        }
        if let Some(to) = to {
            conditions.push(Condition::new(column.clone(), CompareOp::Lte, to));
        }
        conditions
    }

    fn parse_field_condition(field: &str, value: &Value, out: &mut Vec<Condition>) -> Result<(), FilterError> {
        let column = Ident::new(field).map_err(|_| FilterError::InvalidColumn(field.to_string()))?;

        if let Value::Object(obj) = value {
            if obj.is_empty() {
                return Err(FilterError::InvalidOperatorData(format!("empty condition for '{}'", field)));
            }
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                Self::check_scalar(op_key, op_val)?;
                out.push(Condition::new(column.clone(), operator, Param::from(op_val.clone())));
            }
        } else {
            Self::check_scalar(field, value)?;
            out.push(Condition::eq(column, Param::from(value.clone())));
        }
        Ok(())
    }

    fn check_scalar(context: &str, value: &Value) -> Result<(), FilterError> {
        match value {
            Value::Array(_) | Value::Object(_) => Err(FilterError::InvalidOperatorData(format!(
                "{} requires a scalar value",
                context
            ))),
            _ => Ok(()),
        }
    }

    fn map_operator(op_key: &str) -> Result<CompareOp, FilterError> {
        Ok(match op_key {
            "$eq" => CompareOp::Eq,
            "$ne" | "$neq" => CompareOp::Ne,
            "$gt" => CompareOp::Gt,
            "$gte" => CompareOp::Gte,
            "$lt" => CompareOp::Lt,
            "$lte" => CompareOp::Lte,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_operators() {
        let conditions = FilterWhere::parse(&json!({
            "status": "active",
            "last_action": { "$ne": "D" }
        }))
        .unwrap();

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].column.as_str(), "status");
        assert_eq!(conditions[0].op, CompareOp::Eq);
        assert_eq!(conditions[1].op, CompareOp::Ne);
        assert_eq!(conditions[1].value, Param::Text("D".to_string()));
    }

    #[test]
    fn rejects_raw_sql_and_logical_operators() {
        assert!(matches!(
            FilterWhere::parse(&json!("1=1; DROP TABLE x")),
            Err(FilterError::InvalidWhereClause(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "$or": [] })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "a": { "$like": "x%" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn rejects_unsafe_columns() {
        assert!(matches!(
            FilterWhere::parse(&json!({ "name\" OR 1=1 --": 1 })),
            Err(FilterError::InvalidColumn(_))
        ));
    }

    #[test]
    fn range_bounds_are_inclusive_and_optional() {
        let column = Ident::new("timestamp").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let open = FilterWhere::range(&column, Some(from), None);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].op, CompareOp::Gte);

        let closed = FilterWhere::range(&column, Some(from), Some(from));
        assert_eq!(closed[1].op, CompareOp::Lte);
        assert!(FilterWhere::range(&column, None, None).is_empty());
    }
}
