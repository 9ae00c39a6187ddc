use std::sync::Arc;

use tracing::{debug, warn};

use super::{Database, DatabaseError, QueryResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Outcome of one execution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Statement ran; rows may be empty
    Rows(QueryResult),
    /// Statement failed and attempts remain: re-prompt with the error, then call again with `attempt + 1`
    Retry(DatabaseError),
    /// Statement failed on the last allowed attempt
    Failed(DatabaseError),
}

/// Runs model-generated SQL with a bounded, linear attempt count
#[derive(Clone)]
pub struct QueryExecutor {
    database: Arc<dyn Database>,
    max_attempts: u32,
}

impl QueryExecutor {
    pub fn new(database: Arc<dyn Database>, max_attempts: u32) -> Self {
        Self {
            database,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt` is zero-based
    #[tracing::instrument(skip(self, sql))]
    pub async fn execute(&self, sql: &str, attempt: u32) -> QueryOutcome {
        match self.database.execute(sql).await {
            Ok(result) => {
                debug!(target: "query_executor", rows = result.len(), "Query succeeded");
                QueryOutcome::Rows(result)
            }
            Err(e) if attempt + 1 >= self.max_attempts => {
                warn!(target: "query_executor", error = %e, "Can not query the database based on the given prompt");
                QueryOutcome::Failed(e)
            }
            Err(e) => {
                debug!(target: "query_executor", error = %e, "Query failed; retry allowed");
                QueryOutcome::Retry(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{MockDatabase, SqlValue};

    fn rows() -> QueryResult {
        QueryResult {
            columns: vec!["name".into()],
            rows: vec![vec![SqlValue::Text("Alfreds".into())]],
        }
    }

    #[tokio::test]
    async fn returns_rows_on_success() {
        let mut db = MockDatabase::new();
        db.expect_execute()
            .withf(|sql| sql == "SELECT name FROM Customers")
            .times(1)
            .returning(|_| Ok(rows()));

        let executor = QueryExecutor::new(Arc::new(db), 3);
        let outcome = executor.execute("SELECT name FROM Customers", 0).await;

        assert_eq!(outcome, QueryOutcome::Rows(rows()));
    }

    #[tokio::test]
    async fn permanent_failure_stops_after_three_attempts() {
        let mut db = MockDatabase::new();
        db.expect_execute()
            .times(3)
            .returning(|_| Err(DatabaseError::Execution("no such table: Foo".into())));

        let executor = QueryExecutor::new(Arc::new(db), DEFAULT_MAX_ATTEMPTS);

        let mut attempt = 0;
        let outcome = loop {
            match executor.execute("SELECT * FROM Foo", attempt).await {
                QueryOutcome::Retry(_) => attempt += 1,
                other => break other,
            }
        };

        assert_eq!(attempt, 2);
        assert!(matches!(outcome, QueryOutcome::Failed(DatabaseError::Execution(_))));
    }

    #[tokio::test]
    async fn empty_result_is_not_failure() {
        let mut db = MockDatabase::new();
        db.expect_execute()
            .returning(|_| Ok(QueryResult::default()));

        let executor = QueryExecutor::new(Arc::new(db), 3);
        match executor.execute("SELECT 1 WHERE 0", 2).await {
            QueryOutcome::Rows(r) => assert!(r.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
