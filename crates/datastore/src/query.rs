//! Bounded query executor.
//!
//! Runs a model-written query string against the store and returns a
//! human-readable preview. Never raises past its own boundary: success and
//! failure both come back as strings sized for direct inclusion in a
//! further model prompt.

use gavel_core::error::StoreError;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};

use crate::store::RelationalStore;

const MAX_ROWS: usize = 5;
const MAX_VALUE_CHARS: usize = 500;
const MAX_RENDER_CHARS: usize = 5000;
const MAX_ERROR_CHARS: usize = 100;
const CATALOG_PREVIEW_TABLES: usize = 3;
const ELLIPSIS: &str = "...";

/// Execute a query and render a bounded preview.
///
/// At most 5 data rows are shown; the header states the true total row
/// count. Text values are clipped to 500 characters and the whole rendered
/// string to 5000, each with an ellipsis marker. On failure the returned
/// string carries the truncated error plus a partial table catalog.
pub async fn execute_preview(store: &RelationalStore, raw: &str) -> String {
    // Literal braces are template leakage from the model, never valid SQL.
    let cleaned: String = raw.chars().filter(|c| *c != '{' && *c != '}').collect();

    match run(store, &cleaned).await {
        Ok(preview) => preview,
        Err(e) => describe_failure(store, &e).await,
    }
}

async fn run(store: &RelationalStore, sql: &str) -> Result<String, StoreError> {
    let rows = sqlx::query(sql)
        .fetch_all(store.pool())
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

    let total = rows.len();
    let headers: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let data: Vec<Vec<String>> = rows
        .iter()
        .take(MAX_ROWS)
        .map(|row| {
            (0..row.columns().len())
                .map(|i| clip_chars(&decode_value(row, i), MAX_VALUE_CHARS))
                .collect()
        })
        .collect();

    let table = clip_chars(&render_table(&headers, &data), MAX_RENDER_CHARS);
    Ok(format!("Query result ({total} rows):\n{table}"))
}

async fn describe_failure(store: &RelationalStore, err: &StoreError) -> String {
    let message = match err {
        StoreError::QueryFailed(m) => m.clone(),
        other => other.to_string(),
    };
    let message = clip_chars(&message, MAX_ERROR_CHARS);

    let catalog = store.catalog().await.unwrap_or_default();
    let mut listing: Vec<String> = catalog
        .iter()
        .take(CATALOG_PREVIEW_TABLES)
        .map(|t| format!("- {}: {}", t.name, t.columns.join(", ")))
        .collect();
    if catalog.len() > CATALOG_PREVIEW_TABLES {
        listing.push(ELLIPSIS.to_string());
    }

    format!(
        "Query error: {message}\n\nAvailable tables and columns (partial):\n{}",
        listing.join("\n")
    )
}

/// Decode one cell to text. Imported columns are TEXT, but expressions
/// (COUNT, AVG) come back as integers or reals, and NULLs are possible.
fn decode_value(row: &SqliteRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(|b| format!("<{} bytes>", b.len())).unwrap_or_default();
    }
    String::new()
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(headers, &widths));
    for row in rows {
        lines.push(render_row(row, &widths));
    }
    lines.join("\n")
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Clip to at most `max_chars` characters, appending an ellipsis marker
/// when anything was cut.
fn clip_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{ELLIPSIS}", &s[..idx]),
        None => s.to_string(),
    }
}
