//! Relational store for gavel.
//!
//! On startup the loader imports every CSV file in the files directory into
//! a SQLite table named after the file. The query executor runs model-written
//! SQL against the store and renders a bounded, prompt-safe preview string.

pub mod loader;
pub mod query;
pub mod store;

pub use loader::import_dir;
pub use query::execute_preview;
pub use store::{RelationalStore, TableInfo};
