//! SQLite statement executor

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteColumn, SqliteConnectOptions, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::placeholder::{translate, PlaceholderStyle};
use super::traits::{DatabaseError, PoolStatus, Statement, StatementExecutor};
use super::{bounded, rollback, DEFAULT_QUERY_TIMEOUT};
use crate::config::PoolConfig;
use crate::value::{Record, Value};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

const PLACEHOLDERS: PlaceholderStyle = PlaceholderStyle::QuestionMark;

/// SQLite statement executor
pub struct SqliteExecutor {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqliteExecutor {
    /// Wrap an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Open the pool and its minimum connections now
    pub async fn connect(config: &PoolConfig) -> Result<Self, DatabaseError> {
        let (pool_options, connect_options) = Self::options(config)?;
        let pool = pool_options.connect_with(connect_options).await?;
        info!(
            database = %config.database,
            min = config.min_size,
            max = config.max_size,
            "created sqlite connection pool"
        );
        Ok(Self::new(pool).with_query_timeout(config.query_timeout()))
    }

    /// Build the pool without connecting; the first lease opens a connection
    pub fn connect_lazy(config: &PoolConfig) -> Result<Self, DatabaseError> {
        let (pool_options, connect_options) = Self::options(config)?;
        let pool = pool_options.connect_lazy_with(connect_options);
        info!(database = %config.database, "created lazy sqlite connection pool");
        Ok(Self::new(pool).with_query_timeout(config.query_timeout()))
    }

    fn options(
        config: &PoolConfig,
    ) -> Result<(SqlitePoolOptions, SqliteConnectOptions), DatabaseError> {
        // Every connection to `:memory:` opens its own database, so the pool
        // must hold exactly one connection and never recycle it.
        if config.is_in_memory() {
            let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            let pool_options = SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(config.acquire_timeout());
            return Ok((pool_options, connect_options));
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(true);
        let pool_options = SqlitePoolOptions::new()
            .min_connections(config.min_size)
            .max_connections(config.max_size)
            .acquire_timeout(config.acquire_timeout());
        Ok((pool_options, connect_options))
    }

    fn bind_args<'q>(mut query: SqliteQuery<'q>, args: &[Value]) -> SqliteQuery<'q> {
        for arg in args {
            query = match arg {
                Value::Null | Value::TypedNull(_) => query.bind(None::<String>),
                Value::Bool(value) => query.bind(*value),
                Value::Integer(value) => query.bind(*value),
                Value::Float(value) => query.bind(*value),
                Value::Text(value) => query.bind(value.clone()),
            };
        }
        query
    }

    /// Convert a SQLite row to a record, keeping select-list order
    fn row_to_record(row: &SqliteRow) -> Result<Record, DatabaseError> {
        let mut record = Record::new();
        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            record.push(column.name(), value);
        }
        Ok(record)
    }

    /// Extract a column value by its reported affinity
    fn extract_column_value(row: &SqliteRow, column: &SqliteColumn) -> Result<Value, DatabaseError> {
        let index = column.ordinal();

        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        match column.type_info().name() {
            "INTEGER" | "BIGINT" | "INT8" => {
                if let Ok(value) = row.try_get::<i64, _>(index) {
                    return Ok(Value::Integer(value));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" => {
                if let Ok(value) = row.try_get::<f64, _>(index) {
                    return Ok(Value::Float(value));
                }
            }
            "TEXT" | "VARCHAR" | "CHAR" | "CLOB" => {
                if let Ok(value) = row.try_get::<String, _>(index) {
                    return Ok(Value::Text(value));
                }
            }
            "BOOLEAN" | "BOOL" => {
                if let Ok(value) = row.try_get::<bool, _>(index) {
                    return Ok(Value::Bool(value));
                }
            }
            _ => {}
        }

        // Expression columns report whatever the value turned out to be
        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::Integer(value));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            return Ok(Value::Float(value));
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::Text(value));
        }
        if let Ok(value) = row.try_get::<bool, _>(index) {
            return Ok(Value::Bool(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::Text(format!("[BLOB: {} bytes]", value.len())));
        }

        Ok(Value::Null)
    }
}

#[async_trait]
impl StatementExecutor for SqliteExecutor {
    async fn select(
        &self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let sql = translate(sql, PLACEHOLDERS);
        let limit = limit.filter(|size| *size > 0);
        debug!(sql = %sql, args = args.len(), ?limit, "select");

        let mut connection = self.pool.acquire().await?;
        let query = Self::bind_args(sqlx::query(&sql), args);
        let rows = bounded(self.query_timeout, async {
            let mut stream = query.fetch(&mut *connection);
            let mut rows = Vec::new();
            while let Some(row) = stream.try_next().await? {
                rows.push(row);
                if limit.is_some_and(|size| rows.len() >= size) {
                    break;
                }
            }
            Ok::<_, sqlx::Error>(rows)
        })
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn execute(
        &self,
        sql: &str,
        args: &[Value],
        autocommit: bool,
    ) -> Result<u64, DatabaseError> {
        let sql = translate(sql, PLACEHOLDERS);
        debug!(sql = %sql, args = args.len(), autocommit, "execute");
        let query = Self::bind_args(sqlx::query(&sql), args);

        if autocommit {
            let mut connection = self.pool.acquire().await?;
            let result = bounded(self.query_timeout, query.execute(&mut *connection)).await?;
            return Ok(result.rows_affected());
        }

        let mut transaction = self.pool.begin().await?;
        match bounded(self.query_timeout, query.execute(&mut *transaction)).await {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(error) => {
                rollback(transaction).await;
                Err(error)
            }
        }
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64, DatabaseError> {
        let mut transaction = self.pool.begin().await?;
        let mut affected = 0;

        for statement in statements {
            let sql = translate(&statement.sql, PLACEHOLDERS);
            debug!(sql = %sql, args = statement.args.len(), "execute in batch");
            let query = Self::bind_args(sqlx::query(&sql), &statement.args);
            match bounded(self.query_timeout, query.execute(&mut *transaction)).await {
                Ok(result) => affected += result.rows_affected(),
                Err(error) => {
                    rollback(transaction).await;
                    return Err(error);
                }
            }
        }

        transaction.commit().await?;
        Ok(affected)
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn executor() -> (tempfile::TempDir, SqliteExecutor) {
        let directory = tempfile::tempdir().unwrap();
        let config = PoolConfig {
            database: directory.path().join("test.db").display().to_string(),
            max_size: 2,
            ..PoolConfig::default()
        };
        let executor = SqliteExecutor::connect(&config).await.unwrap();
        executor
            .execute(
                "CREATE TABLE items (id TEXT PRIMARY KEY, name TEXT, score REAL, active BOOLEAN, n INTEGER)",
                &[],
                true,
            )
            .await
            .unwrap();
        (directory, executor)
    }

    #[tokio::test]
    async fn test_select_converts_cells_and_honours_limit() {
        let (_directory, executor) = executor().await;
        for index in 0..3i64 {
            let affected = executor
                .execute(
                    "INSERT INTO items (id, name, score, active, n) VALUES (?, ?, ?, ?, ?)",
                    &[
                        Value::from(format!("id-{}", index)),
                        Value::Null,
                        Value::from(1.5),
                        Value::from(true),
                        Value::from(index),
                    ],
                    true,
                )
                .await
                .unwrap();
            assert_eq!(affected, 1);
        }

        let rows = executor
            .select("SELECT id, name, score, active, n FROM items ORDER BY n", &[], Some(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::from("id-0")));
        assert_eq!(rows[0].get("name"), Some(&Value::Null));
        assert_eq!(rows[0].get("score"), Some(&Value::Float(1.5)));
        assert_eq!(rows[1].get("n"), Some(&Value::Integer(1)));
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            ["id", "name", "score", "active", "n"]
        );

        let all = executor.select("SELECT id FROM items", &[], None).await.unwrap();
        assert_eq!(all.len(), 3);
        let zero_means_all = executor.select("SELECT id FROM items", &[], Some(0)).await.unwrap();
        assert_eq!(zero_means_all.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let (_directory, executor) = executor().await;
        executor
            .execute("INSERT INTO items (id) VALUES (?)", &[Value::from("a")], false)
            .await
            .unwrap();

        let result = executor
            .execute_batch(&[
                Statement::new("INSERT INTO items (id) VALUES (?)", vec![Value::from("b")]),
                Statement::new("INSERT INTO items (id) VALUES (?)", vec![Value::from("a")]),
            ])
            .await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));

        let rows = executor.select("SELECT id FROM items", &[], None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::from("a")));
    }

    #[tokio::test]
    async fn test_driver_errors_surface_as_query_errors() {
        let (_directory, executor) = executor().await;
        let result = executor.select("SELECT nope FROM missing", &[], None).await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));

        let result = executor
            .execute("INSERT INTO missing VALUES (?)", &[Value::from(1)], false)
            .await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));
        assert!(executor.status().size >= 1);
    }

    #[tokio::test]
    async fn test_in_memory_pool_shares_one_connection() {
        let config = PoolConfig {
            database: ":memory:".to_string(),
            ..PoolConfig::default()
        };
        let executor = SqliteExecutor::connect(&config).await.unwrap();
        executor
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[], true)
            .await
            .unwrap();
        executor
            .execute("INSERT INTO t (id) VALUES (?)", &[Value::from(7)], true)
            .await
            .unwrap();

        let rows = executor.select("SELECT id FROM t", &[], None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(executor.status().size, 1);
    }

    /// Counts to five million; long enough to still be running after 50ms
    const SLOW_SELECT: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 5000000) SELECT count(*) AS n FROM c";

    async fn single_connection(directory: &tempfile::TempDir) -> SqliteExecutor {
        let config = PoolConfig {
            database: directory.path().join("single.db").display().to_string(),
            min_size: 1,
            max_size: 1,
            acquire_timeout_seconds: 1,
            ..PoolConfig::default()
        };
        SqliteExecutor::connect(&config).await.unwrap()
    }

    async fn wait_for_idle(executor: &SqliteExecutor) {
        for _ in 0..200 {
            if executor.status().idle == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn select_one(executor: &SqliteExecutor) {
        let rows = executor.select("SELECT 1 AS one", &[], None).await.unwrap();
        assert_eq!(rows[0].get("one"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn test_saturated_pool_fails_new_leases() {
        let directory = tempfile::tempdir().unwrap();
        let executor = single_connection(&directory).await;

        let held = executor.pool.acquire().await.unwrap();
        let started = std::time::Instant::now();
        let result = executor.select("SELECT 1", &[], None).await;
        assert!(matches!(result, Err(DatabaseError::PoolExhausted(_))));
        assert!(started.elapsed() >= Duration::from_millis(900));

        drop(held);
        select_one(&executor).await;
    }

    #[tokio::test]
    async fn test_cancelled_select_returns_its_lease() {
        let directory = tempfile::tempdir().unwrap();
        let executor = single_connection(&directory).await;

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            executor.select(SLOW_SELECT, &[], None),
        )
        .await;
        assert!(cancelled.is_err());

        // the lease comes back once the worker has finished the statement
        wait_for_idle(&executor).await;
        assert_eq!(executor.status(), PoolStatus { size: 1, idle: 1 });
        select_one(&executor).await;
    }

    #[tokio::test]
    async fn test_query_timeout_surfaces_and_releases_lease() {
        let directory = tempfile::tempdir().unwrap();
        let executor = single_connection(&directory)
            .await
            .with_query_timeout(Duration::from_millis(50));

        let result = executor.select(SLOW_SELECT, &[], None).await;
        assert!(matches!(result, Err(DatabaseError::Timeout)));

        wait_for_idle(&executor).await;
        assert_eq!(executor.status().idle, 1);
        select_one(&executor).await;
    }
}
