//! CLI subcommands.

use std::path::PathBuf;

use anyhow::Context;
use gavel_config::AppConfig;

pub mod ask;
pub mod serve;

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => AppConfig::load().context("failed to load config"),
    }
}
