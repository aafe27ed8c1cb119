// src/routes/mod.rs
pub mod chat;

use crate::client::{CHAT_PATH, GRAPH_STRUCTURE_PATH};
use crate::state::SharedState;
use axum::{
    Router,
    routing::{get, post},
};
use chat::{chat_handler, graph_structure_handler};
use tower_http::trace::TraceLayer;

pub fn create_router() -> Router<SharedState> {
    Router::new()
        .route(CHAT_PATH, post(chat_handler))
        .route(GRAPH_STRUCTURE_PATH, get(graph_structure_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
}
