//! Bounded file previews.
//!
//! The model asks for files by name; names resolve against a fixed files
//! directory. Every outcome is a string suitable for feeding straight back
//! into a prompt, so previews are clipped hard and failures are rendered
//! as descriptive text instead of errors.

use std::path::Path;

const MAX_PREVIEW_CHARS: usize = 1000;
const PREVIEW_ROWS: usize = 5;
const PREVIEW_COLS: usize = 5;
const ELLIPSIS: &str = "...";

/// Read a bounded preview of `filename` under `files_dir`.
///
/// CSV files get a tabular preview of the first 5 rows and first 5
/// columns, with an ellipsis column appended when the source is wider.
/// Anything else is read as UTF-8 text and clipped to 1000 characters.
/// Missing or unreadable files come back as descriptive strings; this
/// function never fails.
pub fn read_preview(files_dir: &Path, filename: &str) -> String {
    let path = files_dir.join(filename);
    if !path.exists() {
        return format!("Error: File {filename} not found");
    }

    if path.extension().and_then(|e| e.to_str()) == Some("csv") {
        return csv_preview(&path, filename);
    }

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => return format!("Error: Failed to read {filename}: {e}"),
    };
    match String::from_utf8(bytes) {
        Ok(content) => clip_chars(&content, MAX_PREVIEW_CHARS),
        Err(_) => "Error: cannot read binary file".to_string(),
    }
}

fn csv_preview(path: &Path, filename: &str) -> String {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => return format!("Error: Failed to read {filename}: {e}"),
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return format!("Error: Failed to read {filename}: {e}"),
    };
    let total_cols = headers.len();
    let wide = total_cols > PREVIEW_COLS;

    let mut header_cells: Vec<String> = headers
        .iter()
        .take(PREVIEW_COLS)
        .map(str::to_string)
        .collect();
    if wide {
        header_cells.push(ELLIPSIS.to_string());
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records().take(PREVIEW_ROWS) {
        let record = match record {
            Ok(record) => record,
            Err(e) => return format!("Error: Failed to read {filename}: {e}"),
        };
        let mut cells: Vec<String> = record
            .iter()
            .take(PREVIEW_COLS)
            .map(str::to_string)
            .collect();
        if wide {
            cells.push(ELLIPSIS.to_string());
        }
        rows.push(cells);
    }

    let table = clip_chars(&render_table(&header_cells, &rows), MAX_PREVIEW_CHARS);
    format!("File preview (first {PREVIEW_ROWS} rows):\n{table}")
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            if len > widths[idx] {
                widths[idx] = len;
            }
        }
    }

    let mut lines = vec![render_row(headers, &widths)];
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

fn clip_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{ELLIPSIS}", &s[..idx]),
        None => s.to_string(),
    }
}
