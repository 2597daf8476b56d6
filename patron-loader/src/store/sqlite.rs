//! SQLite-backed store

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::error::StoreError;
use super::filter::{Condition, Filter, QueryError};
use super::value::{Document, QueryValue};
use super::Store;
use crate::model::{Collection, Column, ColumnType, PatronRecord, Reference};

/// Rows per INSERT statement, keeps bound parameters well under SQLite's limit
const MAX_ROWS_PER_STATEMENT: usize = 2000;

/// A [`Store`] over a single SQLite connection
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and verify it answers
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database url: {}", url))?
            .foreign_keys(true)
            .with_regexp();

        // One connection: the loader is the only writer, and an in-memory
        // database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Couldn't connect to database: {}", url))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Couldn't ping database")?;

        log::debug!("Connected to {}", url);
        Ok(Self { pool })
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.message().starts_with("no such table") {
                return StoreError::NotFound(db.message().to_string());
            }
        }
        StoreError::backend(error)
    }
}

/// Reference collection a patrons column points at
fn foreign_key(column: &str) -> Option<Collection> {
    match column {
        "patron_type_code" => Some(Collection::PatronTypes),
        "home_library_code" => Some(Collection::Libraries),
        "notification_type_code" => Some(Collection::NotificationTypes),
        _ => None,
    }
}

fn create_table_sql(collection: Collection) -> String {
    let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];

    for column in collection.columns() {
        let sql_type = match column.column_type {
            ColumnType::Text => "TEXT",
            ColumnType::Integer | ColumnType::Bool => "INTEGER",
        };
        let mut definition = format!("{} {}", column.name, sql_type);
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        if collection == Collection::Patrons {
            if let Some(target) = foreign_key(column.name) {
                definition.push_str(&format!(" REFERENCES {}(code)", target.name()));
            }
        }
        columns.push(definition);
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        collection.name(),
        columns.join(",\n    ")
    )
}

/// Look up a column by name, rejecting anything not in the collection schema
fn checked_column(collection: Collection, field: &str) -> Result<&'static Column, QueryError> {
    collection
        .column(field)
        .ok_or_else(|| QueryError::UnknownField {
            collection: collection.name().to_string(),
            field: field.to_string(),
        })
}

fn column_list(collection: Collection) -> String {
    collection
        .columns()
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_column(
    row: &SqliteRow,
    index: usize,
    column: &Column,
) -> Result<QueryValue, sqlx::Error> {
    let value = match column.column_type {
        ColumnType::Text => QueryValue::from(row.try_get::<Option<String>, _>(index)?),
        ColumnType::Integer => QueryValue::from(row.try_get::<Option<i64>, _>(index)?),
        ColumnType::Bool => QueryValue::from(row.try_get::<Option<bool>, _>(index)?),
    };
    Ok(value)
}

fn push_scalar(builder: &mut QueryBuilder<'_, Sqlite>, value: &QueryValue) {
    match value {
        QueryValue::Bool(b) => builder.push_bind(*b),
        QueryValue::Int(i) => builder.push_bind(*i),
        QueryValue::Float(f) => builder.push_bind(*f),
        QueryValue::String(s) => builder.push_bind(s.clone()),
        // Parsing only lets scalars through; anything else compares as NULL
        _ => builder.push("NULL"),
    };
}

fn push_value_list(builder: &mut QueryBuilder<'_, Sqlite>, values: &[&QueryValue]) {
    builder.push("(");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_scalar(builder, value);
    }
    builder.push(")");
}

fn push_comparison(
    builder: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    operator: &str,
    value: &QueryValue,
) {
    builder.push(format!("{} {} ", column, operator));
    push_scalar(builder, value);
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, condition: &Condition) {
    match condition {
        Condition::Eq(QueryValue::Null) | Condition::Exists(false) => {
            builder.push(format!("{} IS NULL", column));
        }
        Condition::Ne(QueryValue::Null) | Condition::Exists(true) => {
            builder.push(format!("{} IS NOT NULL", column));
        }
        Condition::Eq(value) => push_comparison(builder, column, "=", value),
        Condition::Ne(value) => {
            // Absent values count as "not equal"
            builder.push(format!("({} IS NULL OR ", column));
            push_comparison(builder, column, "!=", value);
            builder.push(")");
        }
        Condition::Gt(value) => push_comparison(builder, column, ">", value),
        Condition::Gte(value) => push_comparison(builder, column, ">=", value),
        Condition::Lt(value) => push_comparison(builder, column, "<", value),
        Condition::Lte(value) => push_comparison(builder, column, "<=", value),
        Condition::In(values) => {
            let present: Vec<_> = values.iter().filter(|v| !v.is_null()).collect();
            let with_null = present.len() != values.len();
            match (present.is_empty(), with_null) {
                (true, false) => {
                    builder.push("1 = 0");
                }
                (true, true) => {
                    builder.push(format!("{} IS NULL", column));
                }
                (false, or_null) => {
                    builder.push(format!("({} IN ", column));
                    push_value_list(builder, &present);
                    if or_null {
                        builder.push(format!(" OR {} IS NULL", column));
                    }
                    builder.push(")");
                }
            }
        }
        Condition::Nin(values) => {
            let present: Vec<_> = values.iter().filter(|v| !v.is_null()).collect();
            let with_null = present.len() != values.len();
            match (present.is_empty(), with_null) {
                (true, false) => {
                    builder.push("1 = 1");
                }
                (true, true) => {
                    builder.push(format!("{} IS NOT NULL", column));
                }
                (false, and_not_null) => {
                    let prefix = if and_not_null { "IS NOT NULL AND" } else { "IS NULL OR" };
                    builder.push(format!("({} {} {} NOT IN ", column, prefix, column));
                    push_value_list(builder, &present);
                    builder.push(")");
                }
            }
        }
        Condition::Regex(pattern) => {
            // CASE keeps NULLs away from the regexp function
            builder.push(format!(
                "CASE WHEN {col} IS NULL THEN 0 ELSE {col} REGEXP ",
                col = column
            ));
            builder.push_bind(pattern.clone());
            builder.push(" END");
        }
    }
}

fn push_filter(
    builder: &mut QueryBuilder<'_, Sqlite>,
    collection: Collection,
    filter: &Filter,
) -> Result<(), QueryError> {
    match filter {
        Filter::All(parts) if parts.is_empty() => {
            builder.push("1 = 1");
        }
        Filter::Any(parts) if parts.is_empty() => {
            builder.push("1 = 0");
        }
        Filter::All(parts) | Filter::Any(parts) => {
            let joiner = if matches!(filter, Filter::All(_)) { " AND " } else { " OR " };
            builder.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    builder.push(joiner);
                }
                push_filter(builder, collection, part)?;
            }
            builder.push(")");
        }
        Filter::Field { field, condition } => {
            let column = checked_column(collection, field)?;
            push_condition(builder, column.name, condition);
        }
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn drop_collection(&self, collection: Collection) -> Result<(), StoreError> {
        if !self.table_exists(collection.name()).await? {
            return Err(StoreError::NotFound(format!("collection {}", collection)));
        }
        sqlx::query(&format!("DROP TABLE {}", collection.name()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_collection(&self, collection: Collection) -> Result<(), StoreError> {
        sqlx::query(&create_table_sql(collection))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_unique_index(
        &self,
        collection: Collection,
        field: &str,
    ) -> Result<(), StoreError> {
        let column = checked_column(collection, field)?;
        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_{col} ON {table}({col})",
            table = collection.name(),
            col = column.name
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_index(&self, collection: Collection, field: &str) -> Result<(), StoreError> {
        let column = checked_column(collection, field)?;
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col})",
            table = collection.name(),
            col = column.name
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_reference(&self, reference: &Reference) -> Result<bool, StoreError> {
        let collection = reference.collection();
        let label = collection.label_field().unwrap_or("description");
        let sql = format!(
            "INSERT INTO {} (code, {}) VALUES (?, ?) ON CONFLICT(code) DO NOTHING",
            collection.name(),
            label
        );

        let result = sqlx::query(&sql)
            .bind(reference.code())
            .bind(reference.label())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_patrons(&self, records: &[PatronRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                Collection::Patrons.name(),
                column_list(Collection::Patrons)
            ));

            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.patron_type_code.as_str())
                    .push_bind(record.patron_type_description.as_str())
                    .push_bind(record.checkout_total.as_str())
                    .push_bind(record.renewal_total.as_str())
                    .push_bind(record.age_range.as_str())
                    .push_bind(record.home_library_code.as_str())
                    .push_bind(record.home_library_name.as_str())
                    .push_bind(record.active_month.map(i64::from))
                    .push_bind(record.active_year.as_deref())
                    .push_bind(record.notification_type_code.as_str())
                    .push_bind(record.notification_type_description.as_str())
                    .push_bind(record.email.as_deref())
                    .push_bind(record.within_sf_county)
                    .push_bind(record.year_registered.as_deref());
            });

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        // Dropping the transaction on an early return above rolls it back
        tx.commit().await?;
        Ok(inserted)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE ",
            column_list(collection),
            collection.name()
        ));
        push_filter(&mut builder, collection, filter)?;
        builder.push(" ORDER BY id LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut document = Document::new();
            for (index, column) in collection.columns().iter().enumerate() {
                document.insert(column.name, decode_column(row, index, column)?);
            }
            documents.push(document);
        }
        Ok(documents)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE ", collection.name()));
        push_filter(&mut builder, collection, filter)?;

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn group_count(
        &self,
        collection: Collection,
        field: &str,
    ) -> Result<Vec<(QueryValue, u64)>, StoreError> {
        let column = checked_column(collection, field)?;
        let sql = format!(
            "SELECT {col}, COUNT(*) AS count FROM {table} \
             GROUP BY {col} ORDER BY count DESC, {col}",
            col = column.name,
            table = collection.name()
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            let key = decode_column(row, 0, column)?;
            let count: i64 = row.try_get("count")?;
            groups.push((key, count.max(0) as u64));
        }
        Ok(groups)
    }
}
