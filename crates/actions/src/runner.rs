//! Dispatch of parsed action directives to local executors.

use std::path::PathBuf;

use async_trait::async_trait;
use gavel_core::action::{ActionDirective, ActionRunner};
use gavel_datastore::RelationalStore;
use tracing::info;

use crate::file_read::read_preview;

/// Runs directives against the local files directory and relational store.
#[derive(Debug, Clone)]
pub struct LocalActionRunner {
    store: RelationalStore,
    files_dir: PathBuf,
}

impl LocalActionRunner {
    pub fn new(store: RelationalStore, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            files_dir: files_dir.into(),
        }
    }
}

#[async_trait]
impl ActionRunner for LocalActionRunner {
    async fn run(&self, directive: &ActionDirective) -> String {
        match directive {
            ActionDirective::ReadFile(filename) => {
                info!(file = %filename, "Executing file read");
                read_preview(&self.files_dir, filename)
            }
            ActionDirective::Sql(query) => {
                info!(query = %query, "Executing query");
                gavel_datastore::execute_preview(&self.store, query).await
            }
        }
    }
}
