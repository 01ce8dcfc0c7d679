//! SQLite store handle and schema introspection.

use gavel_core::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// One table in the store: its name and ordered column names.
///
/// Derived from the live schema by introspection, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
}

/// Handle to the relational store holding imported tabular data.
///
/// Cheap to clone; the pool is shared.
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Open (or create) the store at the given path.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral store
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        info!("Relational store opened at {path}");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// List all user tables with their ordered column names.
    pub async fn catalog(&self) -> Result<Vec<TableInfo>, StoreError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Table listing: {e}")))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| StoreError::Storage(format!("name column: {e}")))?;

            let column_rows =
                sqlx::query("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| StoreError::Storage(format!("Column listing: {e}")))?;

            let columns = column_rows
                .iter()
                .map(|r| {
                    r.try_get::<String, _>("name")
                        .map_err(|e| StoreError::Storage(format!("column name: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;

            tables.push(TableInfo { name, columns });
        }

        Ok(tables)
    }
}
