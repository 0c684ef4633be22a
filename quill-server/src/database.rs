use quill_orm::schema::quote_identifier;
use quill_orm::{ColumnType, Database, Driver, Entity, Result, Statement, TableSchema};
use tracing::info;

use crate::models::{Blog, Comment, Image, User};

/// Register the blog entities and create their tables when missing
pub async fn setup(database: &Database, driver: Driver) -> Result<()> {
    let mut statements = Vec::new();
    statements.extend(table_statements::<User>(database, driver)?);
    statements.extend(table_statements::<Blog>(database, driver)?);
    statements.extend(table_statements::<Comment>(database, driver)?);
    statements.extend(table_statements::<Image>(database, driver)?);

    // One registered email per user
    statements.push(Statement::new(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx_users_email" ON "users" ("email")"#,
        Vec::new(),
    ));

    database.execute_batch(&statements).await?;
    info!(tables = 4, "database schema ready");
    Ok(())
}

fn table_statements<E: Entity>(database: &Database, driver: Driver) -> Result<Vec<Statement>> {
    database.register::<E>()?;
    let schema = database.schema::<E>()?;
    Ok(vec![
        Statement::new(create_table(&schema, driver), Vec::new()),
        Statement::new(
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&format!("idx_{}_created_at", schema.table())),
                schema.quoted_table(),
                quote_identifier("created_at")
            ),
            Vec::new(),
        ),
    ])
}

/// `CREATE TABLE IF NOT EXISTS` for a schema; every column is `NOT NULL`
pub fn create_table(schema: &TableSchema, driver: Driver) -> String {
    let columns: Vec<String> = schema
        .fields()
        .map(|(name, field)| {
            let mut column = format!(
                "{} {} NOT NULL",
                quote_identifier(name),
                column_type(field.column_type(), driver)
            );
            if field.is_primary_key() {
                column.push_str(" PRIMARY KEY");
            }
            column
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.quoted_table(),
        columns.join(", ")
    )
}

fn column_type(column_type: ColumnType, driver: Driver) -> &'static str {
    match (column_type, driver) {
        (ColumnType::String | ColumnType::Text, _) => "TEXT",
        (ColumnType::Boolean, _) => "BOOLEAN",
        (ColumnType::Integer, Driver::Sqlite) => "INTEGER",
        (ColumnType::Integer, Driver::Postgres) => "BIGINT",
        (ColumnType::Float, Driver::Sqlite) => "REAL",
        (ColumnType::Float, Driver::Postgres) => "DOUBLE PRECISION",
    }
}
