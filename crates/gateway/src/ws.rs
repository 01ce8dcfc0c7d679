//! Per-conversation WebSocket endpoint.
//!
//! Protocol:
//! - On connect the server replays prior turns as one
//!   `{type: "history", content: [{role, content}, ...]}` frame.
//! - Client → server: `{content: "..."}` to ask a question, or
//!   `{type: "stop"}` to cancel the running chain.
//! - Server → client: a `{role: "user"}` echo, one `{role: "assistant"}`
//!   frame per model response, and `{type: "status", content: "done"}`
//!   when the chain stops.
//!
//! A new question while a chain is still running cancels the old chain
//! first; the session lock keeps the two chains from interleaving turns.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use gavel_core::error::Error;
use gavel_core::message::ConversationId;

use crate::SharedState;

/// Inbound client frame: a chat message or a control command.
#[derive(Deserialize)]
struct ClientFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    content: Option<String>,
}

/// One replayed or live chat message.
#[derive(Serialize)]
struct ChatFrame {
    role: &'static str,
    content: String,
}

/// Connect-time history replay.
#[derive(Serialize)]
struct HistoryFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    content: Vec<ChatFrame>,
}

/// Loop status notification.
#[derive(Serialize)]
struct StatusFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'static str,
}

/// `GET /ws/{conversation_id}` — bidirectional chat channel.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, conversation_id))
}

async fn handle_connection(socket: WebSocket, state: SharedState, conversation_id: String) {
    info!(conversation_id = %conversation_id, "WebSocket connection established");

    let (mut sink, mut inbound) = socket.split();

    // All frames funnel through one channel so the chain task and the
    // receive loop never write to the socket concurrently.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let records = state.history.load(&ConversationId::from(&conversation_id));
    if !records.is_empty() {
        let mut replay = Vec::with_capacity(records.len() * 2);
        for record in &records {
            replay.push(ChatFrame {
                role: "user",
                content: record.user_input.clone(),
            });
            replay.push(ChatFrame {
                role: "assistant",
                content: record.assistant_response.clone(),
            });
        }
        send_frame(
            &out_tx,
            &HistoryFrame {
                kind: "history",
                content: replay,
            },
        );
    }

    while let Some(msg) = inbound.next().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue, // ignore binary, ping, pong
            Err(_) => break,
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                send_frame(
                    &out_tx,
                    &ChatFrame {
                        role: "assistant",
                        content: format!("Error: invalid frame: {e}"),
                    },
                );
                continue;
            }
        };

        if frame.kind.as_deref() == Some("stop") {
            state.registry.cancel(&conversation_id).await;
            continue;
        }

        let Some(content) = frame.content else {
            continue;
        };

        send_frame(
            &out_tx,
            &ChatFrame {
                role: "user",
                content: content.clone(),
            },
        );

        // Cancels any chain still running for this conversation.
        let (session, cancel) = state.registry.checkout(&conversation_id).await;

        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel::<String>();
        let assistant_out = out_tx.clone();
        tokio::spawn(async move {
            while let Some(response) = tap_rx.recv().await {
                send_frame(
                    &assistant_out,
                    &ChatFrame {
                        role: "assistant",
                        content: response,
                    },
                );
            }
        });

        let chain_out = out_tx.clone();
        let chain_id = conversation_id.clone();
        tokio::spawn(async move {
            let result = {
                let mut session = session.lock().await;
                session.send(&content, &cancel, Some(&tap_tx)).await
            };
            match result {
                Ok(_) | Err(Error::Cancelled) => {
                    send_frame(
                        &chain_out,
                        &StatusFrame {
                            kind: "status",
                            content: "done",
                        },
                    );
                }
                Err(e) => {
                    error!(conversation_id = %chain_id, error = %e, "Chain failed");
                    send_frame(
                        &chain_out,
                        &ChatFrame {
                            role: "assistant",
                            content: format!("Error: {e}"),
                        },
                    );
                }
            }
        });
    }

    info!(conversation_id = %conversation_id, "WebSocket connection closed");
}

fn send_frame<T: Serialize>(tx: &mpsc::UnboundedSender<String>, frame: &T) {
    let _ = tx.send(serde_json::to_string(frame).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_command_parses() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "stop"}"#).unwrap();
        assert_eq!(frame.kind.as_deref(), Some("stop"));
        assert!(frame.content.is_none());
    }

    #[test]
    fn chat_message_parses_with_extra_fields() {
        // The front end sends a role field; it is irrelevant server-side.
        let frame: ClientFrame =
            serde_json::from_str(r#"{"role": "user", "content": "hello"}"#).unwrap();
        assert!(frame.kind.is_none());
        assert_eq!(frame.content.as_deref(), Some("hello"));
    }

    #[test]
    fn status_frame_shape() {
        let json = serde_json::to_string(&StatusFrame {
            kind: "status",
            content: "done",
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"status","content":"done"}"#);
    }

    #[test]
    fn history_frame_shape() {
        let json = serde_json::to_string(&HistoryFrame {
            kind: "history",
            content: vec![
                ChatFrame {
                    role: "user",
                    content: "q".into(),
                },
                ChatFrame {
                    role: "assistant",
                    content: "a".into(),
                },
            ],
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"history","content":[{"role":"user","content":"q"},{"role":"assistant","content":"a"}]}"#
        );
    }
}
