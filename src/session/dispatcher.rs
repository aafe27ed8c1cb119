// src/session/dispatcher.rs
use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::projection::{self, View};
use super::state::SessionState;
use crate::client::ChatService;
use crate::error::{ServiceError, SubmitRejection};
use crate::message::{ChatMessage, ChatRequest, ChatResponse, Message};

pub type SharedSession = Arc<RwLock<SessionState>>;

/// What became of a single `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent and the session is unchanged.
    Rejected(SubmitRejection),
    /// The service answered and its history was adopted.
    Reconciled,
    /// The round trip failed; the session carries the error.
    Failed(ServiceError),
    /// The session was reset while the request was in flight; the response was dropped.
    Discarded,
}

/// Owns the write side of a [`SessionState`] and runs chat turns against a
/// [`ChatService`], one at a time.
///
/// The service history is authoritative: a successful response replaces the
/// local history wholesale.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn ChatService>,
    session: SharedSession,
    context: Map<String, Value>,
    echo_errors_inline: bool,
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("context", &self.context)
            .field("echo_errors_inline", &self.echo_errors_inline)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            session: Arc::new(RwLock::new(SessionState::new())),
            context: Map::new(),
            echo_errors_inline: false,
        }
    }

    /// Adds an entry to the free-form `context` sent with every turn.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Also surface failures as an assistant message in the conversation.
    pub fn echo_errors_inline(mut self, enabled: bool) -> Self {
        self.echo_errors_inline = enabled;
        self
    }

    /// Shared handle for readers.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn snapshot(&self) -> SessionState {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn view(&self) -> View {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        projection::project(&session)
    }

    /// Start over. Any response still in flight will be discarded.
    pub fn reset(&self) -> u64 {
        let epoch = lock_write(&self.session).reset();
        tracing::info!(epoch, "session reset");
        epoch
    }

    /// Seed the session graph from the service's static workflow.
    ///
    /// The seed is dropped if the session was reset, or a turn committed a
    /// graph, while it was being fetched.
    pub async fn load_graph_structure(&self) -> Result<(), ServiceError> {
        let (epoch, generation) = {
            let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
            (session.epoch(), session.graph_generation())
        };
        let graph = self.service.graph_structure().await?;

        let mut session = lock_write(&self.session);
        if session.epoch() != epoch {
            tracing::debug!(epoch, "dropping graph structure for a reset session");
            return Ok(());
        }
        if session.graph_generation() != generation {
            tracing::debug!(generation, "dropping graph structure superseded by a newer graph");
            return Ok(());
        }
        session
            .replace_graph(graph)
            .map_err(|e| ServiceError::Protocol(format!("invalid workflow graph: {e}")))
    }

    /// Send a user utterance.
    ///
    /// Empty input and input arriving while another turn is in flight are
    /// rejected without touching the session. Otherwise the message is
    /// appended immediately, the full history is sent, and the outcome is
    /// reconciled. The pending flag is always cleared afterwards, even if this
    /// future is dropped before completion.
    pub async fn submit(&self, content: &str, user_id: &str) -> SubmitOutcome {
        let content = content.trim();
        if content.is_empty() {
            tracing::debug!("ignoring empty submission");
            return SubmitOutcome::Rejected(SubmitRejection::Empty);
        }

        let (request, in_flight) = {
            let mut session = lock_write(&self.session);
            if session.is_pending() {
                tracing::debug!("ignoring submission while a request is in flight");
                return SubmitOutcome::Rejected(SubmitRejection::InFlight);
            }
            session.set_pending(true);
            session.clear_error();
            session.append_message(Message::user(content));

            let request =
                ChatRequest::from_history(session.messages(), user_id, self.context.clone());
            let in_flight = InFlight::new(Arc::clone(&self.session), session.epoch());
            (request, in_flight)
        };

        tracing::info!(
            user_id,
            epoch = in_flight.epoch,
            history = request.messages.len(),
            "dispatching chat turn"
        );
        let result = self.service.send_turn(&request).await;

        let mut session = lock_write(&self.session);
        if session.epoch() != in_flight.epoch {
            in_flight.disarm();
            tracing::warn!(user_id, "discarding response for a reset session");
            return SubmitOutcome::Discarded;
        }

        let outcome = match result.and_then(require_messages) {
            Ok(response) => {
                reconcile(&mut session, response);
                SubmitOutcome::Reconciled
            }
            Err(err) => {
                self.record_failure(&mut session, &err);
                SubmitOutcome::Failed(err)
            }
        };
        session.set_pending(false);
        in_flight.disarm();
        outcome
    }

    fn record_failure(&self, session: &mut SessionState, err: &ServiceError) {
        tracing::error!(error = %err, transport = err.is_transport(), "chat turn failed");
        session.set_error(err.to_string());
        if self.echo_errors_inline {
            session.append_message(Message::assistant(format!(
                "Sorry, I couldn't process your message. {err}"
            )));
        }
    }
}

fn lock_write(session: &SharedSession) -> RwLockWriteGuard<'_, SessionState> {
    session.write().unwrap_or_else(PoisonError::into_inner)
}

fn require_messages(response: ChatResponse) -> Result<ChatResponse, ServiceError> {
    if response.messages.is_empty() {
        return Err(ServiceError::Protocol(
            "response did not include any messages".to_string(),
        ));
    }
    Ok(response)
}

fn reconcile(session: &mut SessionState, response: ChatResponse) {
    let history = adopt_history(session.messages(), response.messages, Utc::now());
    let len = history.len();
    session.replace_history(history);

    if let Some(graph) = response.graph_state {
        let current = graph.current_node.clone();
        match session.replace_graph(graph) {
            Ok(()) => tracing::debug!(current_node = %current, "workflow graph updated"),
            Err(e) => tracing::warn!(error = %e, "ignoring invalid workflow graph"),
        }
    }

    tracing::info!(
        messages = len,
        requires_action = response.requires_action,
        action_type = ?response.action_type,
        "chat turn reconciled"
    );
}

// Messages without a timestamp keep the one already shown locally at the same
// position, otherwise they are stamped `now`.
fn adopt_history(local: &[Message], remote: Vec<ChatMessage>, now: DateTime<Utc>) -> Vec<Message> {
    remote
        .into_iter()
        .enumerate()
        .map(|(i, msg)| {
            let timestamp = msg
                .timestamp
                .or_else(|| {
                    local
                        .get(i)
                        .filter(|l| l.role == msg.role && l.content == msg.content)
                        .map(|l| l.timestamp)
                })
                .unwrap_or(now);
            Message::with_timestamp(msg.role, msg.content, timestamp)
        })
        .collect()
}

// Clears the pending flag if the turn is abandoned before it is reconciled.
struct InFlight {
    session: SharedSession,
    epoch: u64,
    armed: bool,
}

impl InFlight {
    fn new(session: SharedSession, epoch: u64) -> Self {
        Self { session, epoch, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = lock_write(&self.session);
        if session.epoch() == self.epoch && session.is_pending() {
            session.set_pending(false);
            tracing::warn!(epoch = self.epoch, "chat turn abandoned before completion");
        }
    }
}
