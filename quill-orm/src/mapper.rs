//! Entity operations on a [`Database`]

use tracing::warn;

use crate::database::Database;
use crate::entity::{materialize_defaults, Entity, Query};
use crate::schema::quote_identifier;
use crate::value::Value;
use crate::Result;

const COUNT_COLUMN: &str = "_num_";

impl Database {
    /// Fetch the row with primary key `key`
    pub async fn find_by_id<E: Entity>(&self, key: impl Into<Value>) -> Result<Option<E>> {
        let schema = self.schema::<E>()?;
        let mut rows = self
            .select(schema.select_by_key_sql(), &[key.into()], Some(1))
            .await?;
        match rows.pop() {
            Some(record) => Ok(Some(E::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Fetch every row matching `query`
    ///
    /// See [`Query`] for the trusted-caller contract on raw fragments.
    pub async fn find_all<E: Entity>(&self, query: Query) -> Result<Vec<E>> {
        let schema = self.schema::<E>()?;
        let (sql, args) = query.compose(schema.select_sql());
        self.select(&sql, &args, None)
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// `SELECT <expression> FROM <table> [WHERE <filter>]`, single value
    ///
    /// Returns `None` when the statement yields no row. `expression` and
    /// `filter` are raw fragments, as with [`Query`].
    pub async fn count<E: Entity>(
        &self,
        expression: &str,
        filter: Option<&str>,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let schema = self.schema::<E>()?;
        let mut sql = format!(
            "SELECT {} AS {} FROM {}",
            expression,
            quote_identifier(COUNT_COLUMN),
            schema.quoted_table()
        );
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }

        let rows = self.select(&sql, args, Some(1)).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|record| record.get(COUNT_COLUMN).cloned()))
    }

    /// Row count as an integer; no row or `NULL` counts as zero
    pub async fn count_rows<E: Entity>(&self, filter: Option<&str>, args: &[Value]) -> Result<u64> {
        let schema = self.schema::<E>()?;
        let expression = format!("count({})", quote_identifier(schema.primary_key()));
        let count = self.count::<E>(&expression, filter, args).await?;
        Ok(count
            .and_then(|value| value.as_i64())
            .and_then(|number| u64::try_from(number).ok())
            .unwrap_or(0))
    }

    /// Insert `entity`, materializing unset defaults onto it first
    ///
    /// An affected-row count other than 1 is logged, not raised.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<u64> {
        let schema = self.schema::<E>()?;
        materialize_defaults(&schema, entity)?;

        let args = schema.row_arguments(&*entity);

        let rows = self
            .execute(schema.insert_sql(), &args, self.autocommit())
            .await?;
        if rows != 1 {
            warn!(table = schema.table(), rows, "failed to insert record: affected rows != 1");
        }
        Ok(rows)
    }

    /// Write every current attribute of `entity`, keyed by its primary key
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<u64> {
        let schema = self.schema::<E>()?;

        let args = schema.row_arguments(entity);

        let rows = self
            .execute(schema.update_sql(), &args, self.autocommit())
            .await?;
        if rows != 1 {
            warn!(table = schema.table(), rows, "failed to update by primary key: affected rows != 1");
        }
        Ok(rows)
    }

    /// Delete the row keyed by the primary key of `entity`
    ///
    /// The instance itself stays usable but no longer matches a row.
    pub async fn remove<E: Entity>(&self, entity: &E) -> Result<u64> {
        let schema = self.schema::<E>()?;
        let args = [schema.key_argument(entity)];

        let rows = self
            .execute(schema.delete_sql(), &args, self.autocommit())
            .await?;
        if rows != 1 {
            warn!(table = schema.table(), rows, "failed to remove by primary key: affected rows != 1");
        }
        Ok(rows)
    }
}
