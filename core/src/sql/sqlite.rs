use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::{Database, DatabaseError, QueryResult, SqlValue};

/// SQLite collaborator
///
/// Every `execute` opens its own read-only connection on a blocking worker
/// and drops it before returning, on success and on failure alike.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: String,
}

impl SqliteDatabase {
    /// `path` may be a plain file path or a `file:` URI
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

fn run_query(path: &str, sql: &str) -> Result<QueryResult, DatabaseError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    let exec_err = |e: rusqlite::Error| DatabaseError::Execution(e.to_string());

    let mut stmt = conn.prepare(sql).map_err(exec_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let mut rows = stmt.query([]).map_err(exec_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(exec_err)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(SqlValue::from(row.get_ref(i).map_err(exec_err)?));
        }
        out.push(values);
    }

    Ok(QueryResult { columns, rows: out })
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        debug!(target: "sqlite", path = %self.path, "Executing statement");
        let path = self.path.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || run_query(&path, &sql))
            .await
            .map_err(|e| DatabaseError::Worker(e.to_string()))?
    }
}
