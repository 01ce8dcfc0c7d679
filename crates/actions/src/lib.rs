//! # Gavel Actions
//!
//! Executes the side effects the model can request: bounded file previews
//! and SQL query previews against the relational store. The executors are
//! deliberately infallible — every outcome, including failure, is a string
//! the agent loop can feed back into the next prompt.

pub mod file_read;
pub mod runner;

pub use file_read::read_preview;
pub use runner::LocalActionRunner;
