//! The analysis loop — the heart of gavel.
//!
//! The agent follows a **Request → Act → Continue** cycle:
//!
//! 1. **Receive** a user question (HTTP, SSE, or WebSocket)
//! 2. **Build the prompt** (system prompt + replayed turns + new input)
//! 3. **Send to the model** via the configured provider
//! 4. **If the response asks to continue**: run its action (file read or
//!    SQL query), feed the result back as the next input, loop to step 3
//! 5. **If it finishes**: return the response to the caller
//!
//! The loop continues until the model emits `finish`, drops its control
//! tags, or the cycle cap is reached.

pub mod prompt;
pub mod registry;
pub mod runner;
pub mod stream_event;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use prompt::build_system_prompt;
pub use registry::ConversationRegistry;
pub use runner::{AgentSession, SessionReply, SessionSettings};
pub use stream_event::StreamEvent;
pub use tags::{content_text, parse_response, thinking_steps, ParsedResponse, ThinkingStep};
