//! Shared test doubles for loop and registry tests.

use std::sync::Mutex;

use async_trait::async_trait;
use gavel_core::action::{ActionDirective, ActionRunner};
use gavel_core::error::ProviderError;
use gavel_core::message::Message;
use gavel_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it received. Panics if more calls are made than
/// responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The message list of the idx-th request made against this provider.
    pub fn request_messages(&self, idx: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[idx].messages.clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if requests.len() >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                requests.len(),
                responses.len()
            );
        }

        let response = responses[requests.len()].clone();
        requests.push(request);
        Ok(response)
    }
}

/// A provider whose every call fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// An action runner that records every directive and returns a fixed
/// result string.
pub struct RecordingRunner {
    calls: Mutex<Vec<ActionDirective>>,
    result: String,
}

impl RecordingRunner {
    pub fn new(result: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result: result.to_string(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<ActionDirective> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionRunner for RecordingRunner {
    async fn run(&self, directive: &ActionDirective) -> String {
        self.calls.lock().unwrap().push(directive.clone());
        self.result.clone()
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
