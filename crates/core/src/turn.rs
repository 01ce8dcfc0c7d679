//! Turn records — the persisted unit of conversation history.
//!
//! One record is appended per model invocation, whether the invocation was
//! user-initiated or an internal continuation. User input and assistant
//! response are separate typed fields; replay never parses text back into
//! structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{ConversationId, Message};

/// One complete request/response exchange with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// When the exchange completed
    pub timestamp: DateTime<Utc>,

    /// Which conversation this turn belongs to
    pub conversation_id: ConversationId,

    /// Sequential turn number within the conversation, starting at 1
    pub turn: u32,

    /// The system prompt sent with this turn
    pub system_prompt: String,

    /// The input submitted to the model (user question or synthetic
    /// action-result message)
    pub user_input: String,

    /// The model's raw textual response
    pub assistant_response: String,

    /// The full message list sent to the model for this turn
    pub context: Vec<Message>,
}

impl TurnRecord {
    pub fn new(
        conversation_id: ConversationId,
        turn: u32,
        system_prompt: impl Into<String>,
        user_input: impl Into<String>,
        assistant_response: impl Into<String>,
        context: Vec<Message>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            conversation_id,
            turn,
            system_prompt: system_prompt.into(),
            user_input: user_input.into(),
            assistant_response: assistant_response.into(),
            context,
        }
    }
}
