//! `gavel ask` — One-shot analysis from the terminal.
//!
//! Builds the full stack (store, provider, action runner, history) the same
//! way the gateway does, runs a single analysis chain to completion, and
//! prints the extracted answer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use gavel_actions::LocalActionRunner;
use gavel_agent::{content_text, AgentSession, SessionSettings};
use gavel_core::message::ConversationId;
use gavel_datastore::{import_dir, RelationalStore};
use gavel_history::ConversationStore;
use gavel_providers::OpenAiCompatProvider;
use tokio::sync::watch;

pub async fn run(config_path: Option<PathBuf>, question: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    // Check for an API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GAVEL_API_KEY  = 'sk-...'   (takes priority)");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add `api_key` under [provider] in gavel.toml.");
        eprintln!();
        anyhow::bail!("no API key found, see above for setup instructions");
    }

    config
        .ensure_dirs()
        .context("failed to create data directories")?;

    let store = RelationalStore::new(&config.data.db_path().display().to_string())
        .await
        .context("failed to open the relational store")?;
    let imported = import_dir(&store, &config.data.files_dir)
        .await
        .context("failed to import tabular files")?;
    if !imported.is_empty() {
        eprintln!("  Loaded tables: {}", imported.join(", "));
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
    let actions = Arc::new(LocalActionRunner::new(store, &config.data.files_dir));
    let history = ConversationStore::new(&config.history.dir, &config.history.combined_file);
    let settings = SessionSettings::from_config(&config);

    // Each invocation is its own conversation; the transcript still lands
    // in the history directory alongside the gateway's.
    let mut session = AgentSession::new(ConversationId::new(), provider, actions, history, settings);

    let (_cancel_tx, cancel) = watch::channel(false);

    eprint!("  Thinking...");
    let outcome = session.send(question, &cancel, None).await;
    eprint!("\r             \r");

    let reply = outcome.context("analysis failed")?;
    let answer = content_text(&reply.response)
        .map(str::to_string)
        .unwrap_or_else(|| reply.response.clone());
    println!("{answer}");

    Ok(())
}
