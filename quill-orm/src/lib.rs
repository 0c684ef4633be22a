//! # quill-orm
//!
//! A small asynchronous object-relational layer for the quill blog.
//!
//! ## Features
//!
//! - Shared connection pool over SQLite or PostgreSQL
//! - Declarative entity definitions with statement templates built once
//! - Typed find / save / update / remove on top of parameterized SQL
//! - Default values (generated ids, timestamps) applied at save time
//! - Page arithmetic for listing endpoints
//!
//! ## Security Note
//!
//! Only positional `?` arguments are bound. The `WHERE`, `ORDER BY` and
//! aggregate fragments passed to [`Query`] and [`Database::count`] are
//! spliced into SQL verbatim and must come from trusted code.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use quill_orm::{Database, Entity, EntityDefinition, Field, PoolConfig, Query, Record, Value};
//!
//! struct Tag {
//!     id: Option<String>,
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     fn definition() -> EntityDefinition {
//!         EntityDefinition::new("tags")
//!             .field("id", Field::string().primary_key().generated(quill_orm::defaults::next_id))
//!             .field("label", Field::string())
//!     }
//!
//!     fn from_record(mut record: Record) -> quill_orm::Result<Self> {
//!         Ok(Self { id: record.take("id")?, label: record.take("label")? })
//!     }
//!
//!     fn get(&self, column: &str) -> Value {
//!         match column {
//!             "id" => self.id.clone().into(),
//!             "label" => self.label.clone().into(),
//!             _ => Value::Null,
//!         }
//!     }
//!
//!     fn set(&mut self, column: &str, value: Value) -> quill_orm::Result<()> {
//!         use quill_orm::FromValue;
//!         match column {
//!             "id" => self.id = FromValue::from_value(column, value)?,
//!             "label" => self.label = FromValue::from_value(column, value)?,
//!             _ => return Err(quill_orm::Error::UnknownColumn(column.to_string())),
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> quill_orm::Result<()> {
//!     let database = Database::connect(&PoolConfig::default()).await?;
//!     database.register::<Tag>()?;
//!
//!     let mut tag = Tag { id: None, label: "rust".to_string() };
//!     database.save(&mut tag).await?;
//!
//!     let latest: Vec<Tag> = database
//!         .find_all(Query::new().order_by("label").limit(10u64))
//!         .await?;
//!     println!("{} tags", latest.len());
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod database;
pub mod defaults;
pub mod entity;
pub mod mapper;
pub mod pagination;
pub mod schema;
pub mod value;

// Public exports
pub use config::{Driver, PoolConfig};
pub use database::Database;
pub use entity::{materialize_defaults, Entity, Limit, Query};
pub use pagination::{parse_page_index, Page};
pub use schema::{DefinitionError, EntityDefinition, Field, TableSchema};
pub use value::{ColumnType, FromValue, Record, Value};

// Re-export executors
pub use database::traits::{DatabaseError, PoolStatus, Statement, StatementExecutor};

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteExecutor;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresExecutor;

// Error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid limit value: {0}")]
    InvalidLimit(String),

    #[error("Column {column}: expected {expected}, found {found}")]
    Decode {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
