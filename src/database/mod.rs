pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod statement;

pub use backend::{Database, Pool, Row};
pub use error::DatabaseError;
pub use memory::{MemoryConnector, MemoryDatabase};
pub use postgres::PgDatabase;
pub use registry::{redact, Connector, PgConnector, PoolRegistry};
pub use statement::{format_timestamp, numeric_to_json, Ident, Param, SqlResult, SqlType, Statement, StatementKind};
