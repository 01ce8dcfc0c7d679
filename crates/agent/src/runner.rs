//! The bounded analysis loop.
//!
//! An [`AgentSession`] owns one conversation: it assembles the message list
//! from persisted turns, calls the provider, parses the tagged response, and
//! either executes the requested action and loops or stops. Every exchange
//! is appended to the conversation store before the next step runs, so a
//! process restart resumes mid-analysis without losing context.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use gavel_config::AppConfig;
use gavel_core::action::{ActionDirective, ActionRunner};
use gavel_core::error::{Error, Result};
use gavel_core::message::{ConversationId, Message};
use gavel_core::provider::{Provider, ProviderRequest};
use gavel_core::turn::TurnRecord;
use gavel_history::ConversationStore;

use crate::prompt::build_system_prompt;
use crate::tags::{parse_response, ParsedResponse};

/// Loop parameters, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Model identifier passed to the provider.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Hard cap on model calls per incoming request.
    pub max_cycles: u32,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_cycles: config.agent.max_cycles,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_cycles: 10,
        }
    }
}

/// The outcome of one `send` or `resume` call.
#[derive(Debug, Clone)]
pub struct SessionReply {
    /// The last model response of the chain, tags included.
    pub response: String,

    /// The first model response of the chain. Equal to `response` when the
    /// chain settled in a single cycle.
    pub first_response: String,

    /// Total turns in this conversation after the call.
    pub turn_count: u32,

    /// Model calls made by this invocation.
    pub cycles: u32,
}

/// One conversation's analysis loop.
///
/// The session is stateful: it tracks the turn counter and the initial
/// question across calls, and replays all prior exchanges into every
/// provider request. Construction reloads both from disk, so sessions
/// survive restarts.
pub struct AgentSession {
    conversation_id: ConversationId,
    provider: Arc<dyn Provider>,
    actions: Arc<dyn ActionRunner>,
    history: ConversationStore,
    settings: SessionSettings,
    turn_count: u32,
    initial_question: Option<String>,
    records: Vec<TurnRecord>,
}

impl AgentSession {
    /// Create a session, restoring any persisted turns for this conversation.
    pub fn new(
        conversation_id: ConversationId,
        provider: Arc<dyn Provider>,
        actions: Arc<dyn ActionRunner>,
        history: ConversationStore,
        settings: SessionSettings,
    ) -> Self {
        let records = history.load(&conversation_id);
        let turn_count = records.last().map(|r| r.turn).unwrap_or(0);
        let initial_question = records.first().map(|r| r.user_input.clone());

        if !records.is_empty() {
            info!(
                conversation_id = %conversation_id,
                turns = records.len(),
                "Restored conversation from history"
            );
        }

        Self {
            conversation_id,
            provider,
            actions,
            history,
            settings,
            turn_count,
            initial_question,
            records,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    /// Run the analysis chain for a fresh user question.
    ///
    /// Each model response is offered to `tap` as it arrives; the chain
    /// checks `cancel` between cycles and stops with [`Error::Cancelled`]
    /// when it flips.
    pub async fn send(
        &mut self,
        input: &str,
        cancel: &watch::Receiver<bool>,
        tap: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<SessionReply> {
        info!(
            conversation_id = %self.conversation_id,
            turn = self.turn_count + 1,
            "Starting analysis chain"
        );
        self.run_chain(input.to_string(), input, cancel, tap).await
    }

    /// Pick the chain back up from a model response the caller already has.
    ///
    /// If `prior_response` asks to continue, its action is executed and the
    /// chain runs from the result. A finished or unrecognized response is
    /// returned as-is without calling the provider.
    pub async fn resume(
        &mut self,
        prior_response: &str,
        original_question: &str,
        cancel: &watch::Receiver<bool>,
        tap: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<SessionReply> {
        if self.initial_question.is_none() && !original_question.is_empty() {
            self.initial_question = Some(original_question.to_string());
        }

        match parse_response(prior_response) {
            ParsedResponse::Recognized {
                finish: false,
                action,
                ..
            } => {
                info!(
                    conversation_id = %self.conversation_id,
                    "Resuming unfinished analysis chain"
                );
                let input = self.next_input(action.as_ref(), original_question).await;
                if *cancel.borrow() {
                    info!(conversation_id = %self.conversation_id, "Analysis cancelled");
                    return Err(Error::Cancelled);
                }
                self.run_chain(input, original_question, cancel, tap).await
            }
            _ => Ok(SessionReply {
                response: prior_response.to_string(),
                first_response: prior_response.to_string(),
                turn_count: self.turn_count,
                cycles: 0,
            }),
        }
    }

    async fn run_chain(
        &mut self,
        first_input: String,
        initiating_question: &str,
        cancel: &watch::Receiver<bool>,
        tap: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<SessionReply> {
        let mut cycles: u32 = 0;
        let mut input = first_input;
        let mut first_response: Option<String> = None;

        loop {
            cycles += 1;
            self.turn_count += 1;
            if self.turn_count == 1 {
                self.initial_question = Some(initiating_question.to_string());
            }

            let question = self
                .initial_question
                .as_deref()
                .unwrap_or(initiating_question);
            let system_prompt = build_system_prompt(self.turn_count, question);

            let mut messages = Vec::with_capacity(self.records.len() * 2 + 2);
            messages.push(Message::system(&system_prompt));
            for record in &self.records {
                messages.push(Message::user(&record.user_input));
                messages.push(Message::assistant(&record.assistant_response));
            }
            messages.push(Message::user(&input));

            debug!(
                conversation_id = %self.conversation_id,
                turn = self.turn_count,
                cycle = cycles,
                messages = messages.len(),
                "Calling provider"
            );

            let request = ProviderRequest::new(&self.settings.model, messages.clone())
                .with_temperature(self.settings.temperature);
            let response = self.provider.complete(request).await?;
            let response_text = response.message.content.clone();

            let record = TurnRecord::new(
                self.conversation_id.clone(),
                self.turn_count,
                &system_prompt,
                &input,
                &response_text,
                messages,
            );
            self.history.append(&record)?;
            self.records.push(record);

            if let Some(tap) = tap {
                let _ = tap.send(response_text.clone());
            }
            if first_response.is_none() {
                first_response = Some(response_text.clone());
            }

            match parse_response(&response_text) {
                ParsedResponse::Recognized {
                    finish: false,
                    action,
                    ..
                } => {
                    if cycles >= self.settings.max_cycles {
                        warn!(
                            conversation_id = %self.conversation_id,
                            cycles,
                            "Chain hit the cycle cap, stopping"
                        );
                        return Ok(self.reply(response_text, first_response, cycles));
                    }
                    input = self.next_input(action.as_ref(), initiating_question).await;
                    if *cancel.borrow() {
                        info!(conversation_id = %self.conversation_id, "Analysis cancelled");
                        return Err(Error::Cancelled);
                    }
                }
                ParsedResponse::Recognized { finish: true, .. } => {
                    info!(
                        conversation_id = %self.conversation_id,
                        turn = self.turn_count,
                        cycles,
                        "Analysis finished"
                    );
                    return Ok(self.reply(response_text, first_response, cycles));
                }
                ParsedResponse::Unrecognized { .. } => {
                    debug!(
                        conversation_id = %self.conversation_id,
                        "Response without control tags, treating as final"
                    );
                    return Ok(self.reply(response_text, first_response, cycles));
                }
            }
        }
    }

    /// Build the next user input from the model's requested action.
    ///
    /// Without an action the original question is re-asked, so the model
    /// keeps the goal in scope on long chains.
    async fn next_input(
        &self,
        action: Option<&ActionDirective>,
        initiating_question: &str,
    ) -> String {
        match action {
            Some(directive @ ActionDirective::ReadFile(_)) => {
                let result = self.actions.run(directive).await;
                format!("[SYSTEM] File read result:\n{result}")
            }
            Some(directive @ ActionDirective::Sql(_)) => {
                let result = self.actions.run(directive).await;
                format!("[SYSTEM] SQL query result:\n{result}")
            }
            None => {
                let question = if !initiating_question.is_empty() {
                    initiating_question
                } else {
                    self.initial_question.as_deref().unwrap_or("")
                };
                if question.is_empty() {
                    "[SYSTEM] Please continue the analysis.".to_string()
                } else {
                    format!("[ORIGINAL_QUESTION] {question}")
                }
            }
        }
    }

    fn reply(
        &self,
        response: String,
        first_response: Option<String>,
        cycles: u32,
    ) -> SessionReply {
        SessionReply {
            first_response: first_response.unwrap_or_else(|| response.clone()),
            response,
            turn_count: self.turn_count,
            cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, RecordingRunner, SequentialMockProvider};
    use gavel_core::message::Role;
    use std::path::Path;
    use tempfile::tempdir;

    const FINISH: &str = "<content>All findings summarized.</content><if_finish>finish</if_finish>";
    const CONTINUE_SQL: &str =
        "<if_finish>continue</if_finish><action>SQL SELECT COUNT(*) FROM cases</action>";
    const CONTINUE_READ: &str =
        "<if_finish>continue</if_finish><action>READ_FILE cases.csv</action>";
    const CONTINUE_NO_ACTION: &str = "<content>thinking...</content><if_finish>continue</if_finish>";

    fn make_session(
        dir: &Path,
        provider: Arc<dyn Provider>,
        actions: Arc<dyn ActionRunner>,
    ) -> AgentSession {
        AgentSession::new(
            ConversationId::from("test-conv"),
            provider,
            actions,
            ConversationStore::new(dir, "all_conversations.jsonl"),
            SessionSettings::default(),
        )
    }

    #[tokio::test]
    async fn finish_on_first_response_runs_single_turn() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[FINISH]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let reply = session
            .send("What is the acquittal rate?", &cancel, None)
            .await
            .unwrap();

        assert_eq!(reply.response, FINISH);
        assert_eq!(reply.first_response, FINISH);
        assert_eq!(reply.turn_count, 1);
        assert_eq!(reply.cycles, 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn sql_action_result_is_fed_back() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[CONTINUE_SQL, FINISH]));
        let runner = Arc::new(RecordingRunner::new("ROWS"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let reply = session
            .send("How many cases are there?", &cancel, None)
            .await
            .unwrap();

        assert_eq!(reply.cycles, 2);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            runner.calls(),
            vec![ActionDirective::Sql("SELECT COUNT(*) FROM cases".into())]
        );
        assert_eq!(
            session.records()[1].user_input,
            "[SYSTEM] SQL query result:\nROWS"
        );
    }

    #[tokio::test]
    async fn file_read_result_is_wrapped() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[CONTINUE_READ, FINISH]));
        let runner = Arc::new(RecordingRunner::new("file body"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        session.send("Inspect the data", &cancel, None).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![ActionDirective::ReadFile("cases.csv".into())]
        );
        assert_eq!(
            session.records()[1].user_input,
            "[SYSTEM] File read result:\nfile body"
        );
    }

    #[tokio::test]
    async fn continue_without_action_reasks_question() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[
            CONTINUE_NO_ACTION,
            FINISH,
        ]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        session
            .send("What drives acquittals?", &cancel, None)
            .await
            .unwrap();

        assert_eq!(runner.call_count(), 0);
        assert_eq!(
            session.records()[1].user_input,
            "[ORIGINAL_QUESTION] What drives acquittals?"
        );
    }

    #[tokio::test]
    async fn two_sends_advance_turn_counter() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[FINISH, FINISH]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let first = session.send("first question", &cancel, None).await.unwrap();
        let second = session.send("second question", &cancel, None).await.unwrap();

        assert_eq!(first.turn_count, 1);
        assert_eq!(second.turn_count, 2);
        assert_eq!(session.records().len(), 2);
    }

    #[tokio::test]
    async fn second_request_replays_history() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[FINISH, FINISH]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        session.send("first", &cancel, None).await.unwrap();
        session.send("second", &cancel, None).await.unwrap();

        let messages = provider.request_messages(1);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].content, FINISH);
        assert_eq!(messages[3].content, "second");
    }

    #[tokio::test]
    async fn chain_is_capped_at_max_cycles() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[
            CONTINUE_NO_ACTION,
            CONTINUE_NO_ACTION,
        ]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let history = ConversationStore::new(tmp.path(), "all_conversations.jsonl");
        let settings = SessionSettings {
            max_cycles: 2,
            ..SessionSettings::default()
        };
        let mut session = AgentSession::new(
            ConversationId::from("test-conv"),
            provider.clone(),
            runner,
            history,
            settings,
        );
        let (_tx, cancel) = watch::channel(false);

        let reply = session.send("never finishes", &cancel, None).await.unwrap();

        assert_eq!(reply.cycles, 2);
        assert_eq!(reply.response, CONTINUE_NO_ACTION);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_call() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[CONTINUE_NO_ACTION]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (tx, cancel) = watch::channel(false);
        tx.send_replace(true);

        let result = session.send("long analysis", &cancel, None).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(session.records().len(), 1);
    }

    #[tokio::test]
    async fn resume_with_finished_response_is_terminal() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let reply = session
            .resume(FINISH, "original question", &cancel, None)
            .await
            .unwrap();

        assert_eq!(reply.response, FINISH);
        assert_eq!(reply.cycles, 0);
        assert_eq!(reply.turn_count, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn resume_with_continue_executes_action_then_chains() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[FINISH]));
        let runner = Arc::new(RecordingRunner::new("ROWS"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let reply = session
            .resume(CONTINUE_SQL, "orig question", &cancel, None)
            .await
            .unwrap();

        assert_eq!(reply.turn_count, 1);
        assert_eq!(runner.call_count(), 1);
        assert_eq!(session.records().len(), 1);
        assert_eq!(
            session.records()[0].user_input,
            "[SYSTEM] SQL query result:\nROWS"
        );
        assert!(session.records()[0].system_prompt.contains("orig question"));
    }

    #[tokio::test]
    async fn resume_with_empty_question_uses_continue_prompt() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[FINISH]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        session
            .resume(CONTINUE_NO_ACTION, "", &cancel, None)
            .await
            .unwrap();

        assert_eq!(
            session.records()[0].user_input,
            "[SYSTEM] Please continue the analysis."
        );
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let tmp = tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), Arc::new(FailingProvider), runner);
        let (_tx, cancel) = watch::channel(false);

        let result = session.send("any question", &cancel, None).await;

        assert!(matches!(result, Err(Error::Provider(_))));
        assert!(session.records().is_empty());
    }

    #[tokio::test]
    async fn restart_restores_turn_counter_and_question() {
        let tmp = tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new("unused"));
        let (_tx, cancel) = watch::channel(false);

        let provider1 = Arc::new(SequentialMockProvider::from_texts(&[FINISH]));
        let mut session1 = make_session(tmp.path(), provider1, runner.clone());
        session1
            .send("What is the modal sentence?", &cancel, None)
            .await
            .unwrap();
        drop(session1);

        let provider2 = Arc::new(SequentialMockProvider::from_texts(&[FINISH]));
        let mut session2 = make_session(tmp.path(), provider2.clone(), runner);
        assert_eq!(session2.turn_count(), 1);

        let reply = session2.send("follow-up", &cancel, None).await.unwrap();
        assert_eq!(reply.turn_count, 2);

        // The rebuilt system prompt still carries the original question.
        let messages = provider2.request_messages(0);
        assert!(messages[0].content.contains("What is the modal sentence?"));
    }

    #[tokio::test]
    async fn unrecognized_response_is_terminal() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[
            "Plain prose with no tags",
        ]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider.clone(), runner.clone());
        let (_tx, cancel) = watch::channel(false);

        let reply = session.send("a question", &cancel, None).await.unwrap();

        assert_eq!(reply.response, "Plain prose with no tags");
        assert_eq!(reply.cycles, 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn tap_receives_every_model_response() {
        let tmp = tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::from_texts(&[
            CONTINUE_NO_ACTION,
            FINISH,
        ]));
        let runner = Arc::new(RecordingRunner::new("unused"));
        let mut session = make_session(tmp.path(), provider, runner);
        let (_tx, cancel) = watch::channel(false);
        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();

        session
            .send("stream me", &cancel, Some(&tap_tx))
            .await
            .unwrap();

        assert_eq!(tap_rx.recv().await.unwrap(), CONTINUE_NO_ACTION);
        assert_eq!(tap_rx.recv().await.unwrap(), FINISH);
    }
}
