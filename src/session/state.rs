// src/session/state.rs
use crate::error::GraphError;
use crate::graph::WorkflowGraphState;
use crate::message::Message;

/// Everything the client knows about the current conversation.
///
/// Reads are public. Mutations are crate-private and go through the
/// [`Dispatcher`](super::Dispatcher).
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    messages: Vec<Message>,
    pending: bool,
    graph: Option<WorkflowGraphState>,
    error: Option<String>,
    epoch: u64,
    graph_generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// True while a request is awaiting its response.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn graph(&self) -> Option<&WorkflowGraphState> {
        self.graph.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Generation counter, bumped on every reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bumped every time a graph is committed.
    pub fn graph_generation(&self) -> u64 {
        self.graph_generation
    }

    pub(crate) fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn replace_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    /// Replace the graph wholesale. An invalid graph leaves the current one in place.
    pub(crate) fn replace_graph(&mut self, graph: WorkflowGraphState) -> Result<(), GraphError> {
        graph.validate()?;
        self.graph = Some(graph);
        self.graph_generation = self.graph_generation.wrapping_add(1);
        Ok(())
    }

    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    // Drop everything and start a new generation. Returns the new epoch.
    pub(crate) fn reset(&mut self) -> u64 {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self { epoch, ..Self::default() };
        epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_graph_keeps_previous() {
        let mut state = SessionState::new();
        state
            .replace_graph(WorkflowGraphState::support_workflow())
            .unwrap();
        assert_eq!(state.graph_generation(), 1);

        let mut broken = WorkflowGraphState::support_workflow();
        broken.current_node = "NOWHERE".into();
        assert!(state.replace_graph(broken).is_err());
        assert_eq!(state.graph().unwrap().current_node, "ROUTER");
        assert_eq!(state.graph_generation(), 1);
    }

    #[test]
    fn reset_clears_and_bumps_epoch() {
        let mut state = SessionState::new();
        state.append_message(Message::user("hi"));
        state.set_pending(true);
        state.set_error("boom");

        assert_eq!(state.reset(), 1);
        assert!(state.messages().is_empty());
        assert!(!state.is_pending());
        assert_eq!(state.error(), None);
        assert_eq!(state.epoch(), 1);
    }
}
