//! Shared fixtures for gateway router tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gavel_actions::LocalActionRunner;
use gavel_agent::{ConversationRegistry, SessionSettings};
use gavel_core::action::ActionRunner;
use gavel_core::error::ProviderError;
use gavel_core::message::Message;
use gavel_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use gavel_datastore::RelationalStore;
use gavel_history::ConversationStore;

use crate::{AppState, SharedState};

/// Provider returning the same scripted response on every call.
pub struct ScriptedProvider {
    response: String,
}

impl ScriptedProvider {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(&self.response),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// Provider whose every call fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub async fn make_state_with(dir: &Path, provider: Arc<dyn Provider>) -> SharedState {
    let store = RelationalStore::new("sqlite::memory:").await.unwrap();
    let actions: Arc<dyn ActionRunner> = Arc::new(LocalActionRunner::new(store, dir));
    let history = ConversationStore::new(dir, "chat_history.jsonl");

    let registry = ConversationRegistry::new(
        provider,
        actions,
        history.clone(),
        SessionSettings::default(),
        Duration::from_secs(600),
    );

    Arc::new(AppState { registry, history })
}

/// State whose provider always answers with `response`.
pub async fn make_state(dir: &Path, response: &str) -> SharedState {
    make_state_with(dir, Arc::new(ScriptedProvider::new(response))).await
}
