use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    error::AppError,
    graph::{self, WorkflowGraphState},
    message::{ChatMessage, ChatRequest, ChatResponse, MessageRole},
    services::chatbot::{detect_stage, generate_reply},
    state::SharedState,
};

pub const HUMAN_HANDOFF: &str = "human_handoff";

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".to_string()));
    }
    if payload.messages.is_empty() {
        return Err(AppError::Validation("At least one message is required".to_string()));
    }
    if payload.messages.iter().any(|m| m.content.trim().is_empty()) {
        return Err(AppError::Validation("Message content cannot be empty".to_string()));
    }
    let Some(latest) = payload.messages.iter().rev().find(|m| m.role == MessageRole::User) else {
        return Err(AppError::Validation("No user message to answer".to_string()));
    };

    if !state.limiter.check(user_id).await {
        return Err(AppError::RateLimited);
    }

    let stage = detect_stage(&latest.content);
    let reply = generate_reply(stage, &payload.messages, &latest.content);
    tracing::info!(
        user_id,
        stage = stage.node_id(),
        history = payload.messages.len(),
        "routed chat turn"
    );

    let conversation = state.store.open_or_start_conversation(user_id).await?;
    state
        .store
        .append_message(&conversation.id, MessageRole::User, latest.content.clone())
        .await?;
    state
        .store
        .append_message(&conversation.id, MessageRole::Assistant, reply.clone())
        .await?;

    let mut graph_state = WorkflowGraphState::support_workflow();
    graph_state.current_node = graph::ROUTER.to_string();
    graph_state.next_node = stage.node_id().to_string();
    graph_state.requires_action = stage.requires_action();

    let now = Utc::now();
    let mut messages = payload.messages.clone();
    messages.push(ChatMessage::new(MessageRole::Assistant, reply).stamped(now));

    Ok(Json(ChatResponse {
        messages,
        requires_action: stage.requires_action(),
        action_type: stage.requires_action().then(|| HUMAN_HANDOFF.to_string()),
        graph_state: Some(graph_state),
    }))
}

pub async fn graph_structure_handler() -> Json<WorkflowGraphState> {
    Json(WorkflowGraphState::support_workflow())
}
