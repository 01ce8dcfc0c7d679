//! Session registry — one live analysis loop per conversation.
//!
//! Sessions are created lazily on first checkout and evicted after an idle
//! period; their state survives eviction because every turn is persisted to
//! the conversation store. Checking a conversation out cancels any chain
//! still running for it, so a client reconnect always gets a clean loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info};

use gavel_core::action::ActionRunner;
use gavel_core::message::ConversationId;
use gavel_core::provider::Provider;
use gavel_history::ConversationStore;

use crate::runner::{AgentSession, SessionSettings};

/// A live session plus its cancellation strand.
///
/// The watch sender is behind a `std::sync::Mutex` (non-async, held briefly)
/// because swapping it must also flip the old channel.
struct SessionHandle {
    session: Arc<Mutex<AgentSession>>,
    cancel: std::sync::Mutex<watch::Sender<bool>>,
    last_used: std::sync::Mutex<Instant>,
}

impl SessionHandle {
    fn new(session: AgentSession) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            session: Arc::new(Mutex::new(session)),
            cancel: std::sync::Mutex::new(tx),
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }

    /// Cancel whatever chain holds the previous receiver and mint a fresh
    /// cancellation channel for the next one.
    fn replace_cancel(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let mut guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        guard.send_replace(true);
        *guard = tx;
        rx
    }

    fn cancel(&self) {
        let guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        guard.send_replace(true);
    }

    fn touch(&self) {
        let mut guard = self.last_used.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        let guard = self.last_used.lock().unwrap_or_else(|e| e.into_inner());
        guard.elapsed()
    }
}

/// Central registry holding all live conversation sessions.
pub struct ConversationRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    provider: Arc<dyn Provider>,
    actions: Arc<dyn ActionRunner>,
    history: ConversationStore,
    settings: SessionSettings,
    idle_timeout: Duration,
}

impl ConversationRegistry {
    pub fn new(
        provider: Arc<dyn Provider>,
        actions: Arc<dyn ActionRunner>,
        history: ConversationStore,
        settings: SessionSettings,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            actions,
            history,
            settings,
            idle_timeout,
        }
    }

    /// Check out the session for a conversation, creating it on first use.
    ///
    /// Any chain still running for this conversation is cancelled; the
    /// returned receiver belongs to the caller alone. Idle sessions are
    /// swept on the way in.
    pub async fn checkout(
        &self,
        conversation_id: &str,
    ) -> (Arc<Mutex<AgentSession>>, watch::Receiver<bool>) {
        let mut sessions = self.sessions.write().await;

        sessions.retain(|id, handle| {
            let keep = handle.idle_for() < self.idle_timeout;
            if !keep {
                debug!(conversation_id = %id, "Evicting idle session");
            }
            keep
        });

        let handle = sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                info!(conversation_id = %conversation_id, "Creating session");
                Arc::new(SessionHandle::new(AgentSession::new(
                    ConversationId::from(conversation_id),
                    self.provider.clone(),
                    self.actions.clone(),
                    self.history.clone(),
                    self.settings.clone(),
                )))
            })
            .clone();
        drop(sessions);

        let cancel = handle.replace_cancel();
        handle.touch();
        (handle.session.clone(), cancel)
    }

    /// Signal the running chain for a conversation to stop.
    ///
    /// Returns `false` when no live session exists for the id.
    pub async fn cancel(&self, conversation_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(conversation_id) {
            Some(handle) => {
                info!(conversation_id = %conversation_id, "Cancelling analysis");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the live session for a conversation, cancelling its chain.
    /// Persisted history is untouched.
    pub async fn remove(&self, conversation_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.remove(conversation_id) {
            handle.cancel();
            debug!(conversation_id = %conversation_id, "Removed session");
        }
    }

    /// Mint a fresh conversation id. The session itself is created lazily
    /// on first checkout.
    pub fn create(&self) -> String {
        ConversationId::new().to_string()
    }

    /// Drop every live session, cancelling all running chains.
    pub async fn reset_all(&self) {
        let mut sessions = self.sessions.write().await;
        for handle in sessions.values() {
            handle.cancel();
        }
        let count = sessions.len();
        sessions.clear();
        info!(sessions = count, "Reset all sessions");
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether any session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
