//! Statement executor trait
//!
//! This trait defines the interface every database backend must provide.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::value::{Record, Value};

/// One statement with its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Snapshot of the pool's occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    /// Open connections, leased or idle
    pub size: u32,
    /// Connections waiting in the pool
    pub idle: usize,
}

/// Runs SQL written with generic `?` placeholders against a pooled connection
///
/// Every call leases one connection and returns it on all exit paths,
/// including cancellation of the calling task.
#[async_trait]
pub trait StatementExecutor: Send + Sync + 'static {
    /// Run a query and return at most `limit` rows, or all rows when `limit`
    /// is `None` or zero
    async fn select(
        &self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Run a mutating statement and return the affected-row count
    ///
    /// With `autocommit` off the statement runs inside an explicit
    /// transaction that is rolled back before the error is returned.
    async fn execute(&self, sql: &str, args: &[Value], autocommit: bool)
        -> Result<u64, DatabaseError>;

    /// Run several statements in one transaction
    ///
    /// The first failure rolls back everything already executed.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64, DatabaseError>;

    fn status(&self) -> PoolStatus;

    /// Close every connection; later leases fail
    async fn close(&self);
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Driver or connection failure
    #[error("Database error: {0}")]
    Query(String),

    /// No connection became free within the acquire timeout
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Statement exceeded the configured query timeout
    #[error("Query timeout exceeded")]
    Timeout,

    /// The configured driver was not compiled in
    #[error("Driver not enabled in this build: {0}")]
    DriverUnavailable(&'static str),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseError::PoolExhausted(error.to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}
