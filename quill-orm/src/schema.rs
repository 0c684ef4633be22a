//! Declarative entity schemas
//!
//! An [`EntityDefinition`] lists a table's fields once; building it validates
//! the primary key and renders the four canonical statement templates. The
//! templates only ever contain quoted identifiers and `?` placeholders.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use crate::entity::Entity;
use crate::value::{ColumnType, Value};

/// Malformed entity definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Primary key not found for table `{0}`")]
    MissingPrimaryKey(String),

    #[error("Duplicate primary key for field `{field}` on table `{table}`")]
    DuplicatePrimaryKey { table: String, field: String },

    #[error("Field `{field}` declared twice on table `{table}`")]
    DuplicateField { table: String, field: String },

    #[error("Table `{0}` has no columns besides its primary key")]
    NoColumns(String),
}

/// How an unset attribute is filled in at save time
#[derive(Debug, Clone, Default)]
pub enum FieldDefault {
    #[default]
    None,
    Value(Value),
    Generator(fn() -> Value),
}

impl FieldDefault {
    /// Resolve the default; generators run on every call
    pub fn resolve(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Generator(generate) => Some(generate()),
        }
    }
}

/// Descriptor of one entity attribute
#[derive(Debug, Clone)]
pub struct Field {
    column_type: ColumnType,
    primary_key: bool,
    default: FieldDefault,
}

impl Field {
    fn new(column_type: ColumnType, default: FieldDefault) -> Self {
        Self {
            column_type,
            primary_key: false,
            default,
        }
    }

    pub fn string() -> Self {
        Self::new(ColumnType::String, FieldDefault::None)
    }

    pub fn boolean() -> Self {
        Self::new(ColumnType::Boolean, FieldDefault::Value(Value::Bool(false)))
    }

    pub fn integer() -> Self {
        Self::new(ColumnType::Integer, FieldDefault::Value(Value::Integer(0)))
    }

    pub fn float() -> Self {
        Self::new(ColumnType::Float, FieldDefault::Value(Value::Float(0.0)))
    }

    pub fn text() -> Self {
        Self::new(ColumnType::Text, FieldDefault::None)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Use a fixed value when the attribute is unset
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Call `generator` at save time when the attribute is unset
    pub fn generated(mut self, generator: fn() -> Value) -> Self {
        self.default = FieldDefault::Generator(generator);
        self
    }

    /// Drop the type's default so an unset attribute is stored as NULL
    pub fn nullable(mut self) -> Self {
        self.default = FieldDefault::None;
        self
    }

    /// Statement argument for this column; NULL carries the declared type
    pub fn bind(&self, value: Value) -> Value {
        if value.is_null() {
            Value::TypedNull(self.column_type)
        } else {
            value
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default_value(&self) -> &FieldDefault {
        &self.default
    }
}

/// A table name plus its fields in declaration order
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    table: String,
    fields: Vec<(String, Field)>,
}

impl EntityDefinition {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Validate the definition and render the canonical templates
    pub fn build(self) -> Result<TableSchema, DefinitionError> {
        let mut primary_key: Option<String> = None;
        let mut columns = Vec::new();

        for (index, (name, field)) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|(seen, _)| seen == name) {
                return Err(DefinitionError::DuplicateField {
                    table: self.table.clone(),
                    field: name.clone(),
                });
            }

            if field.primary_key {
                if primary_key.is_some() {
                    return Err(DefinitionError::DuplicatePrimaryKey {
                        table: self.table.clone(),
                        field: name.clone(),
                    });
                }
                primary_key = Some(name.clone());
            } else {
                columns.push(name.clone());
            }
        }

        let primary_key =
            primary_key.ok_or_else(|| DefinitionError::MissingPrimaryKey(self.table.clone()))?;
        if columns.is_empty() {
            return Err(DefinitionError::NoColumns(self.table));
        }

        let table = quote_identifier(&self.table);
        let key = quote_identifier(&primary_key);
        let escaped: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();

        let select = format!("SELECT {}, {} FROM {}", key, escaped.join(", "), table);
        let insert = format!(
            "INSERT INTO {} ({}, {}) VALUES ({})",
            table,
            escaped.join(", "),
            key,
            placeholders(escaped.len() + 1)
        );
        let update = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            escaped
                .iter()
                .map(|column| format!("{} = ?", column))
                .collect::<Vec<_>>()
                .join(", "),
            key
        );
        let delete = format!("DELETE FROM {} WHERE {} = ?", table, key);
        let select_by_key = format!("{} WHERE {} = ?", select, key);

        Ok(TableSchema {
            table: self.table,
            primary_key,
            columns,
            fields: self.fields,
            select,
            select_by_key,
            insert,
            update,
            delete,
        })
    }
}

/// Derived, immutable description of one entity type
#[derive(Debug, Clone)]
pub struct TableSchema {
    table: String,
    primary_key: String,
    columns: Vec<String>,
    fields: Vec<(String, Field)>,
    select: String,
    select_by_key: String,
    insert: String,
    update: String,
    delete: String,
}

impl TableSchema {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-primary-key columns in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Every declared field, primary key included, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// `SELECT <pk>, <columns...> FROM <table>`, unconditioned
    pub fn select_sql(&self) -> &str {
        &self.select
    }

    /// Binds the columns in order, then the primary key
    pub fn insert_sql(&self) -> &str {
        &self.insert
    }

    /// Sets every column, keyed by the trailing primary key argument
    pub fn update_sql(&self) -> &str {
        &self.update
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete
    }

    /// Select template narrowed to one primary key
    pub fn select_by_key_sql(&self) -> &str {
        &self.select_by_key
    }

    /// Insert and update arguments for `entity`: columns, then the key
    pub fn row_arguments<E: Entity>(&self, entity: &E) -> Vec<Value> {
        let (key, columns): (Vec<_>, Vec<_>) =
            self.fields().partition(|(_, field)| field.is_primary_key());
        columns
            .into_iter()
            .chain(key)
            .map(|(name, field)| field.bind(entity.get(name)))
            .collect()
    }

    /// Primary key argument for `entity`
    pub fn key_argument<E: Entity>(&self, entity: &E) -> Value {
        let value = entity.get(&self.primary_key);
        match self.fields().find(|(_, field)| field.is_primary_key()) {
            Some((_, field)) => field.bind(value),
            None => value,
        }
    }

    pub fn quoted_table(&self) -> String {
        quote_identifier(&self.table)
    }
}

/// Quote an identifier (table or column name)
///
/// Double quotes work for both SQLite and PostgreSQL; embedded quotes are
/// escaped by doubling them.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Per-handle cache of built schemas, keyed by entity type
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, Arc<TableSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for `E`, built on first request and shared afterwards
    pub fn schema_of<E: Entity>(&self) -> Result<Arc<TableSchema>, DefinitionError> {
        let type_id = TypeId::of::<E>();
        if let Some(schema) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
        {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(E::definition().build()?);
        info!(
            table = schema.table(),
            primary_key = schema.primary_key(),
            columns = schema.columns().len(),
            "registered entity schema"
        );

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(schemas.entry(type_id).or_insert(schema)))
    }

    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
