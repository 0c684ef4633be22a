//! PostgreSQL statement executor

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};
use std::time::Duration;
use tracing::{debug, info};

use super::placeholder::{translate, PlaceholderStyle};
use super::traits::{DatabaseError, PoolStatus, Statement, StatementExecutor};
use super::{bounded, rollback, DEFAULT_QUERY_TIMEOUT};
use crate::config::PoolConfig;
use crate::value::{ColumnType, Record, Value};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const PLACEHOLDERS: PlaceholderStyle = PlaceholderStyle::Numbered;

/// PostgreSQL statement executor
pub struct PostgresExecutor {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresExecutor {
    /// Wrap an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
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
        let (pool_options, connect_options) = Self::options(config);
        let pool = pool_options.connect_with(connect_options).await?;
        info!(
            host = %config.host,
            port = config.effective_port(),
            database = %config.database,
            min = config.min_size,
            max = config.max_size,
            "created postgres connection pool"
        );
        Ok(Self::new(pool).with_query_timeout(config.query_timeout()))
    }

    /// Build the pool without connecting; the first lease opens a connection
    pub fn connect_lazy(config: &PoolConfig) -> Result<Self, DatabaseError> {
        let (pool_options, connect_options) = Self::options(config);
        let pool = pool_options.connect_lazy_with(connect_options);
        info!(host = %config.host, database = %config.database, "created lazy postgres connection pool");
        Ok(Self::new(pool).with_query_timeout(config.query_timeout()))
    }

    fn options(config: &PoolConfig) -> (PgPoolOptions, PgConnectOptions) {
        let connect_options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.effective_port())
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .options([("client_encoding", config.charset.as_str())]);
        let pool_options = PgPoolOptions::new()
            .min_connections(config.min_size)
            .max_connections(config.max_size)
            .acquire_timeout(config.acquire_timeout());
        (pool_options, connect_options)
    }

    fn bind_args<'q>(mut query: PgQuery<'q>, args: &[Value]) -> PgQuery<'q> {
        for arg in args {
            query = match arg {
                // Postgres types every parameter, NULL included. An untyped
                // NULL goes out as text, which only text columns accept.
                Value::Null => query.bind(None::<String>),
                Value::TypedNull(column_type) => match column_type {
                    ColumnType::Boolean => query.bind(None::<bool>),
                    ColumnType::Integer => query.bind(None::<i64>),
                    ColumnType::Float => query.bind(None::<f64>),
                    ColumnType::String | ColumnType::Text => query.bind(None::<String>),
                },
                Value::Bool(value) => query.bind(*value),
                Value::Integer(value) => query.bind(*value),
                Value::Float(value) => query.bind(*value),
                Value::Text(value) => query.bind(value.clone()),
            };
        }
        query
    }

    /// Convert a PostgreSQL row to a record, keeping select-list order
    fn row_to_record(row: &PgRow) -> Result<Record, DatabaseError> {
        let mut record = Record::new();

        for column in row.columns() {
            let index = column.ordinal();

            let value: Value = match column.type_info().name() {
                "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
                "INT2" | "SMALLINT" | "SMALLSERIAL" => row
                    .try_get::<Option<i16>, _>(index)?
                    .map(i64::from)
                    .into(),
                "INT4" | "INT" | "INTEGER" | "SERIAL" => row
                    .try_get::<Option<i32>, _>(index)?
                    .map(i64::from)
                    .into(),
                "INT8" | "BIGINT" | "BIGSERIAL" => row.try_get::<Option<i64>, _>(index)?.into(),
                "FLOAT4" | "REAL" => row
                    .try_get::<Option<f32>, _>(index)?
                    .map(f64::from)
                    .into(),
                "FLOAT8" | "DOUBLE PRECISION" => row.try_get::<Option<f64>, _>(index)?.into(),
                "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" => {
                    row.try_get::<Option<String>, _>(index)?.into()
                }
                "BYTEA" => row
                    .try_get::<Option<Vec<u8>>, _>(index)?
                    .map(|bytes| format!("[BLOB: {} bytes]", bytes.len()))
                    .into(),
                _ => {
                    // Fallback: try to get as string
                    row.try_get::<Option<String>, _>(index)
                        .ok()
                        .flatten()
                        .into()
                }
            };

            record.push(column.name(), value);
        }

        Ok(record)
    }
}

#[async_trait]
impl StatementExecutor for PostgresExecutor {
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
