//! Entity trait and the `find_all` query builder

use crate::pagination::Page;
use crate::schema::{EntityDefinition, TableSchema};
use crate::value::{Record, Value};
use crate::{Error, Result};

/// A strongly typed struct mapped to one table row
///
/// `get`/`set` are the by-name accessors used wherever values are iterated
/// generically: building insert and update arguments, and filling in
/// defaults. `get` must return [`Value::Null`] for an unset attribute.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Table and fields; evaluated once per [`Database`](crate::Database)
    fn definition() -> EntityDefinition;

    /// Build an instance from a row fetched with the select template
    fn from_record(record: Record) -> Result<Self>;

    fn get(&self, column: &str) -> Value;

    fn set(&mut self, column: &str, value: Value) -> Result<()>;
}

/// Fill every unset attribute that has a default
///
/// Generators run here, so identifiers and timestamps reflect the moment of
/// persistence rather than construction.
pub fn materialize_defaults<E: Entity>(schema: &TableSchema, entity: &mut E) -> Result<()> {
    for (name, field) in schema.fields() {
        if !entity.get(name).is_null() {
            continue;
        }
        if let Some(value) = field.default_value().resolve() {
            entity.set(name, value)?;
        }
    }
    Ok(())
}

/// Row cap or page window appended as `LIMIT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Rows(u64),
    Window { offset: u64, count: u64 },
}

impl From<u64> for Limit {
    fn from(rows: u64) -> Self {
        Limit::Rows(rows)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Window { offset, count }
    }
}

impl From<&Page> for Limit {
    fn from(page: &Page) -> Self {
        page.window()
    }
}

impl TryFrom<&serde_json::Value> for Limit {
    type Error = Error;

    /// Accepts an integer or an `[offset, count]` pair
    fn try_from(value: &serde_json::Value) -> Result<Self> {
        let invalid = || Error::InvalidLimit(value.to_string());
        match value {
            serde_json::Value::Number(number) => number.as_u64().map(Limit::Rows).ok_or_else(invalid),
            serde_json::Value::Array(pair) => match pair.as_slice() {
                [offset, count] => Ok(Limit::Window {
                    offset: offset.as_u64().ok_or_else(invalid)?,
                    count: count.as_u64().ok_or_else(invalid)?,
                }),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

/// Optional `WHERE`, `ORDER BY` and `LIMIT` parts of a `find_all`
///
/// # Trust boundary
///
/// `filter` and `order_by` fragments are concatenated into the statement
/// verbatim. Only the positional arguments are bound. Callers must never
/// build these fragments from untrusted input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Option<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    limit: Option<Limit>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `WHERE` fragment with its `?` arguments
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<Value>) -> Self {
        self.filter = Some(clause.into());
        self.args = args;
        self
    }

    /// Raw `ORDER BY` fragment, e.g. `created_at desc`
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Limit from loosely typed input such as a JSON request body
    pub fn try_limit(self, limit: &serde_json::Value) -> Result<Self> {
        Ok(self.limit(Limit::try_from(limit)?))
    }

    /// Append the parts to `select` and collect the bound arguments
    pub(crate) fn compose(&self, select: &str) -> (String, Vec<Value>) {
        let mut sql = vec![select.to_string()];
        let mut args = self.args.clone();

        if let Some(filter) = &self.filter {
            sql.push("WHERE".to_string());
            sql.push(filter.clone());
        }

        if let Some(order_by) = &self.order_by {
            sql.push("ORDER BY".to_string());
            sql.push(order_by.clone());
        }

        match self.limit {
            Some(Limit::Rows(count)) => {
                sql.push("LIMIT ?".to_string());
                args.push(limit_arg(count));
            }
            // LIMIT/OFFSET rather than `LIMIT offset, count` so the same text
            // runs on SQLite and PostgreSQL
            Some(Limit::Window { offset, count }) => {
                sql.push("LIMIT ? OFFSET ?".to_string());
                args.push(limit_arg(count));
                args.push(limit_arg(offset));
            }
            None => {}
        }

        (sql.join(" "), args)
    }
}

fn limit_arg(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SELECT: &str = r#"SELECT "id", "name" FROM "users""#;

    #[test]
    fn test_compose_bare() {
        let (sql, args) = Query::new().compose(SELECT);
        assert_eq!(sql, SELECT);
        assert!(args.is_empty());
    }

    #[test]
    fn test_compose_all_parts() {
        let (sql, args) = Query::new()
            .filter("email=?", vec![Value::from("a@example.com")])
            .order_by("created_at desc")
            .limit((20u64, 10u64))
            .compose(SELECT);

        assert_eq!(
            sql,
            r#"SELECT "id", "name" FROM "users" WHERE email=? ORDER BY created_at desc LIMIT ? OFFSET ?"#
        );
        assert_eq!(
            args,
            vec![Value::from("a@example.com"), Value::Integer(10), Value::Integer(20)]
        );
    }

    #[test]
    fn test_compose_row_cap() {
        let (sql, args) = Query::new().limit(5u64).compose(SELECT);
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(args, vec![Value::Integer(5)]);
    }

    #[test]
    fn test_limit_from_json() {
        assert_eq!(Limit::try_from(&json!(3)).unwrap(), Limit::Rows(3));
        assert_eq!(
            Limit::try_from(&json!([10, 5])).unwrap(),
            Limit::Window { offset: 10, count: 5 }
        );

        for invalid in [json!("10"), json!([1, 2, 3]), json!([1]), json!(-1), json!(null), json!(1.5)] {
            assert!(
                matches!(Limit::try_from(&invalid), Err(Error::InvalidLimit(_))),
                "{} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_try_limit_propagates() {
        assert!(Query::new().try_limit(&json!({"offset": 1})).is_err());
        assert_eq!(
            Query::new().try_limit(&json!([0, 10])).unwrap(),
            Query::new().limit((0u64, 10u64))
        );
    }
}
