//! SQLite-backed [`DataStore`]
//!
//! Wraps a `sqlx::SqlitePool`. Rows are decoded dynamically from the storage
//! class SQLite reports for each cell, so aggregate and expression columns come
//! back with their real type.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use super::{DataStore, QueryOutput, Row, SqlValue, Statement};
use crate::Result;

/// Data store over a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn execute(&self, statement: Statement) -> Result<QueryOutput> {
        let mut query = sqlx::query(&statement.sql);
        for arg in &statement.args {
            query = match arg {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }

        let fetched = query.fetch_all(&self.pool).await?;
        let rows = fetched.iter().map(decode_row).collect::<Result<Vec<_>>>()?;

        tracing::trace!(rows = rows.len(), sql = %statement.sql, "Statement executed");
        Ok(QueryOutput { rows })
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());

        let (is_null, type_name) = {
            let raw = row.try_get_raw(idx)?;
            let is_null = raw.is_null();
            let type_name = raw.type_info().name().to_ascii_uppercase();
            (is_null, type_name)
        };

        let value = if is_null {
            SqlValue::Null
        } else {
            match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => {
                    SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?)
                }
                "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                    SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?)
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
                    SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

/// Open (or create) the importcheck database file and ensure tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with tables created
///
/// The pool is pinned to one connection that never expires; every SQLite
/// in-memory connection is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the imported-records table if missing
///
/// The engine reads this table but never populates it.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            department TEXT NOT NULL DEFAULT '',
            period TEXT NOT NULL,
            ou TEXT,
            amount REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_ou_period ON records (ou, period)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (records)");

    Ok(())
}
