//! Tabular store loader.
//!
//! Scans a directory for `.csv` files and loads each into a table named
//! after the file (extension stripped). An existing table of the same name
//! is fully replaced, schema and rows. A malformed file is a fatal error:
//! the loader never skips bad files silently, because a silently missing
//! table degrades every query the model writes later.

use gavel_core::error::StoreError;
use std::path::Path;
use tracing::info;

use crate::store::RelationalStore;

/// Import every CSV file under `dir` into the store.
///
/// Returns the imported table names in import order (sorted by file name).
/// All columns are stored as TEXT; the header row supplies column names.
pub async fn import_dir(store: &RelationalStore, dir: &Path) -> Result<Vec<String>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        StoreError::Storage(format!("Cannot read files directory {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    let mut imported = Vec::with_capacity(paths.len());
    for path in paths {
        let table = import_file(store, &path).await?;
        imported.push(table);
    }

    Ok(imported)
}

/// Import a single CSV file, replacing any existing table of the same name.
pub async fn import_file(store: &RelationalStore, path: &Path) -> Result<String, StoreError> {
    let file_label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let table = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| StoreError::ImportFailed {
            file: file_label.clone(),
            reason: "file has no base name".into(),
        })?;

    let mut reader = csv::Reader::from_path(path).map_err(|e| StoreError::ImportFailed {
        file: file_label.clone(),
        reason: e.to_string(),
    })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StoreError::ImportFailed {
            file: file_label.clone(),
            reason: e.to_string(),
        })?
        .iter()
        .map(String::from)
        .collect();

    if headers.is_empty() {
        return Err(StoreError::ImportFailed {
            file: file_label,
            reason: "no header row".into(),
        });
    }

    let mut tx = store
        .pool()
        .begin()
        .await
        .map_err(|e| StoreError::Storage(format!("Transaction begin: {e}")))?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table)))
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("Drop of {table}: {e}")))?;

    let column_defs: Vec<String> = headers
        .iter()
        .map(|h| format!("{} TEXT", quote_ident(h)))
        .collect();
    sqlx::query(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(&table),
        column_defs.join(", ")
    ))
    .execute(&mut *tx)
    .await
    .map_err(|e| StoreError::Storage(format!("Create of {table}: {e}")))?;

    let placeholders: Vec<String> = (1..=headers.len()).map(|i| format!("?{i}")).collect();
    let insert_sql = format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(&table),
        placeholders.join(", ")
    );

    let mut row_count: u64 = 0;
    for record in reader.records() {
        let record = record.map_err(|e| StoreError::ImportFailed {
            file: file_label.clone(),
            reason: e.to_string(),
        })?;

        let mut insert = sqlx::query(&insert_sql);
        for field in record.iter() {
            insert = insert.bind(field.to_string());
        }
        insert
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Insert into {table}: {e}")))?;
        row_count += 1;
    }

    tx.commit()
        .await
        .map_err(|e| StoreError::Storage(format!("Transaction commit: {e}")))?;

    info!(table = %table, rows = row_count, "Imported table");
    Ok(table)
}

/// Quote a SQLite identifier (table or column name).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
