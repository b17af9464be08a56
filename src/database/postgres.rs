//! Postgres backend over a `sqlx` pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::{BigDecimal, Json};
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use tracing::debug;

use super::backend::{Database, Row};
use super::error::DatabaseError;
use super::statement::{format_timestamp, numeric_to_json, Param, SqlResult, SqlType, Statement};

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(connection_string)
            .await?;
        Ok(Self::new(pool))
    }
}

fn prepare<'q>(statement: &Statement, sql: &'q SqlResult) -> Query<'q, Postgres, PgArguments> {
    debug!(table = %statement.table(), query = %sql.query, params = sql.params.len(), "executing statement");
    sql.params.iter().fold(sqlx::query(&sql.query), |q, p| bind_param(q, p))
}

#[async_trait]
impl Database for PgDatabase {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, DatabaseError> {
        let sql = statement.to_sql();
        let rows = prepare(statement, &sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        let sql = statement.to_sql();
        let result = prepare(statement, &sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_param<'q>(q: Query<'q, Postgres, PgArguments>, param: &'q Param) -> Query<'q, Postgres, PgArguments> {
    match param {
        Param::Null(ty) => match ty {
            SqlType::Text => q.bind(None::<String>),
            SqlType::Numeric => q.bind(None::<BigDecimal>),
            SqlType::Bool => q.bind(None::<bool>),
            SqlType::Date => q.bind(None::<NaiveDate>),
            SqlType::Timestamp => q.bind(None::<DateTime<Utc>>),
            SqlType::Json => q.bind(None::<Json<Value>>),
        },
        Param::Text(s) => q.bind(s.as_str()),
        Param::Numeric(d) => q.bind(d),
        Param::Bool(b) => q.bind(*b),
        Param::Date(d) => q.bind(*d),
        Param::Timestamp(ts) => q.bind(*ts),
        // multi-select values land in json/jsonb columns
        Param::Json(v) => q.bind(Json(v)),
    }
}

fn row_to_json(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, i, column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, i: usize, type_name: &str) -> Result<Value, DatabaseError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.and_then(|f| Number::from_f64(f as f64)).map(Value::Number),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.and_then(Number::from_f64).map(Value::Number),
        "NUMERIC" => row.try_get::<Option<BigDecimal>, _>(i)?.map(|d| numeric_to_json(&d)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)?
            .map(|ts| Value::String(format_timestamp(&ts))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)?
            .map(|ts| Value::String(format_timestamp(&ts.and_utc()))),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(i)?.map(|d| Value::String(d.to_string())),
        "UUID" => row.try_get::<Option<uuid::Uuid>, _>(i)?.map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i)?,
        "TEXT[]" | "VARCHAR[]" => row
            .try_get::<Option<Vec<String>>, _>(i)?
            .map(|items| Value::Array(items.into_iter().map(Value::String).collect())),
        _ => row.try_get::<Option<String>, _>(i).ok().flatten().map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}
