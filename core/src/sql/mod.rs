//! SQL execution: the database seam, the bounded-retry executor, a read-only
//! SQLite backend, and `CREATE` statement extraction for the schema preamble.

mod executor;
pub mod schema;
mod sqlite;

pub use executor::{QueryExecutor, QueryOutcome, DEFAULT_MAX_ATTEMPTS};
pub use schema::{extract_create_statements, load_schema_script};
pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Failed to open database: {0}")]
    Connection(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Database worker failed: {0}")]
    Worker(String),
}

/// A scalar value of one result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Rows returned by one statement, in engine order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "columns": self.columns,
            "rows": self.rows,
        })
    }
}

/// The database seam: run one statement, return its rows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError>;
}
