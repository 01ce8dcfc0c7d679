//! REST and SSE handlers.
//!
//! The plain HTTP surface follows the front end's chat protocol: a
//! synchronous endpoint returning the terminal chain response, a streaming
//! variant that pages out the model's thinking steps as server-sent events,
//! and housekeeping endpoints for reset and conversation management.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::response::sse::{Event as SseEvent, Sse};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use gavel_agent::{StreamEvent, content_text, thinking_steps};
use gavel_history::ConversationSummary;

use crate::SharedState;

/// Conversation used by the plain HTTP endpoints. The socket surface
/// carries explicit per-conversation ids instead.
const DEFAULT_CONVERSATION: &str = "default";

/// Delay between paged-out thinking events on the SSE stream.
const THINKING_DELAY: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    message: String,

    /// When set, `message` is a model response to pick the chain up from,
    /// not a fresh question.
    #[serde(default, rename = "isProcessing")]
    is_processing: bool,

    #[serde(default, rename = "originalQuestion")]
    original_question: String,
}

#[derive(Serialize)]
pub(crate) struct ChatResponse {
    response: String,
    turn_count: u32,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub(crate) struct ResetResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
pub(crate) struct CreateConversationResponse {
    conversation_id: String,
}

/// `POST /api/chat` — run the analysis chain, return the terminal response.
pub(crate) async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        is_processing = payload.is_processing,
        message_len = payload.message.len(),
        "Chat request"
    );

    let (session, cancel) = state.registry.checkout(DEFAULT_CONVERSATION).await;
    let mut session = session.lock().await;

    let result = if payload.is_processing {
        session
            .resume(&payload.message, &payload.original_question, &cancel, None)
            .await
    } else {
        session.send(&payload.message, &cancel, None).await
    };

    match result {
        Ok(reply) => Ok(Json(ChatResponse {
            response: reply.response,
            turn_count: reply.turn_count,
        })),
        Err(e) => {
            error!(error = %e, "Chat request failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// `POST /api/chat/stream` — run the chain, stream the outcome as SSE.
pub(crate) async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<
    Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>,
    (StatusCode, Json<ErrorResponse>),
> {
    if payload.message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No message provided".into(),
            }),
        ));
    }

    info!(message_len = payload.message.len(), "Chat stream request");

    let (tx, rx) = mpsc::channel::<StreamEvent>(64);
    tokio::spawn(async move {
        stream_chat(state, payload, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type().to_string();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}

/// Run the chain to completion, then page out events: the first response's
/// thinking steps with a fixed delay between them, the final content, and a
/// processing event carrying the terminal response when the chain went on
/// past its first cycle.
async fn stream_chat(state: SharedState, payload: ChatRequest, tx: mpsc::Sender<StreamEvent>) {
    let (session, cancel) = state.registry.checkout(DEFAULT_CONVERSATION).await;
    let mut session = session.lock().await;

    let result = if payload.is_processing {
        session
            .resume(&payload.message, &payload.original_question, &cancel, None)
            .await
    } else {
        session.send(&payload.message, &cancel, None).await
    };
    drop(session);

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "Chat stream failed");
            let _ = tx
                .send(StreamEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    for step in thinking_steps(&reply.first_response) {
        if tx.send(StreamEvent::from(step)).await.is_err() {
            return;
        }
        tokio::time::sleep(THINKING_DELAY).await;
    }

    let final_content = content_text(&reply.first_response)
        .map(str::to_string)
        .unwrap_or_else(|| reply.first_response.clone());
    if tx
        .send(StreamEvent::Final {
            content: final_content,
        })
        .await
        .is_err()
    {
        return;
    }

    if reply.cycles > 1 {
        let _ = tx
            .send(StreamEvent::Processing {
                content: reply.response,
            })
            .await;
    }
}

/// `POST /api/reset` — drop every live session and wipe persisted history.
pub(crate) async fn reset_handler(
    State(state): State<SharedState>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("Resetting all conversations");
    state.registry.reset_all().await;

    match state.history.reset_all() {
        Ok(()) => Ok(Json(ResetResponse {
            status: "success",
            message: "All conversation history cleared",
        })),
        Err(e) => {
            error!(error = %e, "Reset failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// `GET /api/conversations` — known conversations, most recent first.
pub(crate) async fn list_conversations_handler(
    State(state): State<SharedState>,
) -> Json<Vec<ConversationSummary>> {
    Json(state.history.list())
}

/// `POST /api/conversations` — allocate a fresh conversation id.
pub(crate) async fn create_conversation_handler(
    State(state): State<SharedState>,
) -> Json<CreateConversationResponse> {
    let conversation_id = state.registry.create();
    info!(conversation_id = %conversation_id, "Created conversation");
    Json(CreateConversationResponse { conversation_id })
}
