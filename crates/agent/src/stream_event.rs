//! Streaming events for the gateway.
//!
//! `StreamEvent` carries the agent's progressive output to clients over
//! SSE: disclosed reasoning steps first, then the final content, then a
//! `processing` event when the loop ran past its first response.

use serde::{Deserialize, Serialize};

use crate::tags::ThinkingStep;

/// Events emitted while relaying one analysis chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One disclosed reasoning step.
    Thinking {
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
    },

    /// The first response's content.
    Final { content: String },

    /// The chain continued past its first response; carries the terminal
    /// response.
    Processing { content: String },

    /// The chain failed.
    Error { message: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Final { .. } => "final",
            Self::Processing { .. } => "processing",
            Self::Error { .. } => "error",
        }
    }
}

impl From<ThinkingStep> for StreamEvent {
    fn from(step: ThinkingStep) -> Self {
        Self::Thinking {
            summary: step.summary,
            thought: step.thought,
        }
    }
}
