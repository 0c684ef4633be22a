//! Connection pool manager and statement executor
//!
//! A [`Database`] is created once at startup from a [`PoolConfig`] and then
//! cloned into every component that runs queries. It owns the backend
//! executor (and with it the pool) plus the schema registry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::{Driver, PoolConfig};
use crate::entity::Entity;
use crate::schema::{SchemaRegistry, TableSchema};
use crate::value::{Record, Value};
use crate::Result;

pub mod placeholder;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export the main trait
pub use traits::{DatabaseError, PoolStatus, Statement, StatementExecutor};

pub(crate) const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Await a driver future, failing with [`DatabaseError::Timeout`] after `timeout`
///
/// Dropping the future does not interrupt a SQLite statement already handed
/// to the connection's worker; its lease is returned when the worker is done.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    future: impl Future<Output = std::result::Result<T, sqlx::Error>>,
) -> std::result::Result<T, DatabaseError> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(DatabaseError::from),
        Err(_) => Err(DatabaseError::Timeout),
    }
}

/// Roll back, logging rather than masking the error that caused it
pub(crate) async fn rollback<DB: sqlx::Database>(transaction: sqlx::Transaction<'_, DB>) {
    if let Err(error) = transaction.rollback().await {
        warn!(%error, "rollback failed; connection will be discarded");
    }
}

/// Shared handle to the pool, the executor and the schema registry
#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn StatementExecutor>,
    registry: Arc<SchemaRegistry>,
    autocommit: bool,
}

impl Database {
    /// Open the configured pool, connecting its minimum connections now
    pub async fn connect(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let executor: Arc<dyn StatementExecutor> = match config.driver {
            #[cfg(feature = "sqlite")]
            Driver::Sqlite => Arc::new(sqlite::SqliteExecutor::connect(config).await?),
            #[cfg(feature = "postgres")]
            Driver::Postgres => Arc::new(postgres::PostgresExecutor::connect(config).await?),
            #[allow(unreachable_patterns)]
            driver => return Err(unavailable(driver).into()),
        };
        Ok(Self::with_executor(executor, config.autocommit))
    }

    /// Build the pool without opening connections until the first lease
    pub fn connect_lazy(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let executor: Arc<dyn StatementExecutor> = match config.driver {
            #[cfg(feature = "sqlite")]
            Driver::Sqlite => Arc::new(sqlite::SqliteExecutor::connect_lazy(config)?),
            #[cfg(feature = "postgres")]
            Driver::Postgres => Arc::new(postgres::PostgresExecutor::connect_lazy(config)?),
            #[allow(unreachable_patterns)]
            driver => return Err(unavailable(driver).into()),
        };
        Ok(Self::with_executor(executor, config.autocommit))
    }

    /// Wrap any executor, e.g. one sharing a pool built elsewhere
    pub fn with_executor(executor: Arc<dyn StatementExecutor>, autocommit: bool) -> Self {
        Self {
            executor,
            registry: Arc::new(SchemaRegistry::new()),
            autocommit,
        }
    }

    /// Build and cache the schema of `E`, surfacing definition errors now
    pub fn register<E: Entity>(&self) -> Result<()> {
        self.schema::<E>().map(|_| ())
    }

    /// Cached schema of `E`
    pub fn schema<E: Entity>(&self) -> Result<Arc<TableSchema>> {
        Ok(self.registry.schema_of::<E>()?)
    }

    /// Whether entity writes run without an explicit transaction
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub async fn select(
        &self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        Ok(self.executor.select(sql, args, limit).await?)
    }

    pub async fn execute(&self, sql: &str, args: &[Value], autocommit: bool) -> Result<u64> {
        Ok(self.executor.execute(sql, args, autocommit).await?)
    }

    /// Run `statements` atomically; see [`StatementExecutor::execute_batch`]
    pub async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        Ok(self.executor.execute_batch(statements).await?)
    }

    pub fn status(&self) -> PoolStatus {
        self.executor.status()
    }

    pub async fn close(&self) {
        self.executor.close().await;
    }
}

#[allow(dead_code)]
fn unavailable(driver: Driver) -> DatabaseError {
    DatabaseError::DriverUnavailable(match driver {
        Driver::Sqlite => "sqlite",
        Driver::Postgres => "postgres",
    })
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("status", &self.status())
            .field("registered", &self.registry.len())
            .field("autocommit", &self.autocommit)
            .finish()
    }
}
