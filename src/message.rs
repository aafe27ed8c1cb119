// src/message.rs
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::graph::WorkflowGraphState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation as held by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self::with_timestamp(role, content, Utc::now())
    }

    pub fn with_timestamp(
        role: MessageRole,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { role, content: content.into(), timestamp }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// A message on the wire. The timestamp is optional in both directions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), timestamp: None }
    }

    pub fn stamped(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage::new(message.role, message.content.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ChatRequest {
    /// Builds the outbound payload from the full local history. Timestamps are
    /// left to the service.
    pub fn from_history(
        history: &[Message],
        user_id: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            messages: history.iter().map(ChatMessage::from).collect(),
            user_id: user_id.into(),
            context,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_state: Option<WorkflowGraphState>,
}

// Services stamp messages as RFC 3339, as naive UTC ("2024-05-01T10:00:00.123")
// or as unix seconds. Anything else is dropped and back-filled locally.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => parse_timestamp(&s),
        Some(Value::Number(n)) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_carries_role_and_content_only() {
        let history = vec![Message::user("Hello"), Message::assistant("Hi")];
        let req = ChatRequest::from_history(&history, "u-1", Map::new());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"}
                ],
                "user_id": "u-1",
                "context": {}
            })
        );
    }

    #[test]
    fn response_accepts_naive_and_missing_timestamps() {
        let body = r#"{
            "messages": [
                {"role": "user", "content": "a", "timestamp": "2024-05-01T10:00:00.250"},
                {"role": "assistant", "content": "b", "timestamp": "2024-05-01T10:00:01Z"},
                {"role": "assistant", "content": "c", "timestamp": "yesterday"},
                {"role": "system", "content": "d"}
            ]
        }"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.requires_action);
        assert!(resp.graph_state.is_none());
        assert_eq!(
            resp.messages[1].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 1).unwrap())
        );
        assert!(resp.messages[0].timestamp.is_some());
        assert_eq!(resp.messages[2].timestamp, None);
        assert_eq!(resp.messages[3].timestamp, None);
    }

    #[test]
    fn response_accepts_unix_seconds() {
        let body = r#"{"messages":[{"role":"assistant","content":"a","timestamp":1714557600}]}"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            resp.messages[0].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn odd_timestamp_types_are_dropped() {
        let body = r#"{
            "messages": [
                {"role": "user", "content": "a", "timestamp": true},
                {"role": "assistant", "content": "b", "timestamp": {"at": 1}},
                {"role": "assistant", "content": "c", "timestamp": 1.5},
                {"role": "assistant", "content": "d", "timestamp": null}
            ]
        }"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.messages.len(), 4);
        assert!(resp.messages.iter().all(|m| m.timestamp.is_none()));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let body = r#"{"messages":[{"role":"bot","content":"x"}]}"#;
        assert!(serde_json::from_str::<ChatResponse>(body).is_err());
    }
}
