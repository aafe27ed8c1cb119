// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::store::BookingKind;

/// Why a submission was refused before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("message is empty")]
    Empty,
    #[error("a request is already in flight")]
    InFlight,
}

/// Failure of a round trip to the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or the connection broke mid-flight.
    #[error("could not reach the chat service: {0}")]
    Transport(String),
    /// Non-success status, or a body that is not the expected JSON.
    #[error("chat service error: {0}")]
    Protocol(String),
}

impl ServiceError {
    pub fn status(status: u16, body: &str) -> Self {
        if body.trim().is_empty() {
            ServiceError::Protocol(format!("API error: {status}"))
        } else {
            ServiceError::Protocol(format!("API error: {status} - {}", body.trim()))
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Protocol(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// A workflow graph that references nodes it does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("current node '{0}' is not part of the graph")]
    UnknownCurrentNode(String),
    #[error("next node '{0}' is not part of the graph")]
    UnknownNextNode(String),
    #[error("edge {from} -> {to} references an unknown node")]
    UnknownEdgeEndpoint { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),
    #[error("conversation {0} not found")]
    ConversationNotFound(String),
    #[error("{kind} booking {reference} already exists")]
    DuplicateBookingReference { kind: BookingKind, reference: String },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Errors returned by the chat service HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            AppError::Store(StoreError::ConversationNotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            AppError::Store(_) => (StatusCode::CONFLICT, "STORE_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        tracing::warn!(code, error = %self, "chat request failed");
        let body = Json(json!({
            "detail": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
