// src/services/store.rs
//! In-memory document store backing the chat service.
//!
//! Mirrors the collections of the production database and enforces the same
//! constraints: unique user emails, unique booking references per booking
//! collection, and messages that always belong to an existing conversation.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::message::MessageRole;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    Flight,
    Hotel,
    CarRental,
    Excursion,
}

impl BookingKind {
    pub const ALL: [BookingKind; 4] = [
        BookingKind::Flight,
        BookingKind::Hotel,
        BookingKind::CarRental,
        BookingKind::Excursion,
    ];

    /// Name of the collection holding this kind of booking.
    pub fn collection(&self) -> &'static str {
        match self {
            BookingKind::Flight => "flight_bookings",
            BookingKind::Hotel => "hotel_bookings",
            BookingKind::CarRental => "car_rentals",
            BookingKind::Excursion => "excursions",
        }
    }
}

impl fmt::Display for BookingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingKind::Flight => "flight",
            BookingKind::Hotel => "hotel",
            BookingKind::CarRental => "car rental",
            BookingKind::Excursion => "excursion",
        };
        f.write_str(name)
    }
}

/// Fields supplied when creating a booking.
#[derive(Clone, Debug, Default)]
pub struct NewBooking {
    pub user_id: String,
    pub booking_reference: String,
    pub status: String,
    pub payment_status: Option<String>,
    /// Kind-specific details: passengers, rooms, vehicle, activity...
    pub details: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Booking {
    pub id: String,
    pub kind: BookingKind,
    pub user_id: String,
    pub booking_reference: String,
    pub status: String,
    pub payment_status: Option<String>,
    pub details: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<String, User>,
    conversations: HashMap<String, Conversation>,
    messages: Vec<StoredMessage>,
    bookings: HashMap<BookingKind, Vec<Booking>>,
}

#[derive(Clone, Debug, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(
        &self,
        email: &str,
        hashed_password: Option<String>,
    ) -> Result<User, StoreError> {
        let email = email.trim();
        if !EMAIL.is_match(email) {
            return Err(StoreError::InvalidEmail(email.to_string()));
        }

        let mut guard = self.inner.write().await;
        if guard.users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::DuplicateEmail(email.to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password,
            created_at: now,
            updated_at: now,
        };
        guard.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let guard = self.inner.read().await;
        guard
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }

    pub async fn start_conversation(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let conversation = new_conversation(user_id)?;
        let mut guard = self.inner.write().await;
        guard
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    /// Most recently started conversation of `user_id` that has not ended.
    pub async fn open_conversation(&self, user_id: &str) -> Option<Conversation> {
        let guard = self.inner.read().await;
        latest_open(&guard, user_id).cloned()
    }

    /// The open conversation of `user_id`, or a new one. Lookup and insert
    /// happen under one write lock, so concurrent turns share a conversation.
    pub async fn open_or_start_conversation(
        &self,
        user_id: &str,
    ) -> Result<Conversation, StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(open) = latest_open(&guard, user_id) {
            return Ok(open.clone());
        }
        let conversation = new_conversation(user_id)?;
        guard
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        tracing::debug!(user_id, conversation_id = %conversation.id, "conversation started");
        Ok(conversation)
    }

    pub async fn end_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, StoreError> {
        let mut guard = self.inner.write().await;
        let conversation = guard
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.ended_at.get_or_insert_with(Utc::now);
        Ok(conversation.clone())
    }

    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<StoredMessage, StoreError> {
        let mut guard = self.inner.write().await;
        if !guard.conversations.contains_key(conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        };
        guard.messages.push(message.clone());
        Ok(message)
    }

    /// Messages of a conversation in creation order.
    pub async fn conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let guard = self.inner.read().await;
        if !guard.conversations.contains_key(conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }
        Ok(guard
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    pub async fn create_booking(
        &self,
        kind: BookingKind,
        booking: NewBooking,
    ) -> Result<Booking, StoreError> {
        if booking.user_id.trim().is_empty() {
            return Err(StoreError::MissingField("user_id"));
        }
        if booking.booking_reference.trim().is_empty() {
            return Err(StoreError::MissingField("booking_reference"));
        }
        if booking.status.trim().is_empty() {
            return Err(StoreError::MissingField("status"));
        }

        let mut guard = self.inner.write().await;
        let collection = guard.bookings.entry(kind).or_default();
        if collection
            .iter()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(StoreError::DuplicateBookingReference {
                kind,
                reference: booking.booking_reference,
            });
        }

        let now = Utc::now();
        let stored = Booking {
            id: Uuid::new_v4().to_string(),
            kind,
            user_id: booking.user_id,
            booking_reference: booking.booking_reference,
            status: booking.status,
            payment_status: booking.payment_status,
            details: booking.details,
            created_at: now,
            updated_at: now,
        };
        collection.push(stored.clone());
        tracing::debug!(
            collection = kind.collection(),
            reference = %stored.booking_reference,
            "booking created"
        );
        Ok(stored)
    }

    pub async fn find_booking(&self, kind: BookingKind, reference: &str) -> Option<Booking> {
        let guard = self.inner.read().await;
        guard
            .bookings
            .get(&kind)?
            .iter()
            .find(|b| b.booking_reference == reference)
            .cloned()
    }

    /// Every booking of `user_id`, across all booking collections.
    pub async fn user_bookings(&self, user_id: &str) -> Vec<Booking> {
        let guard = self.inner.read().await;
        BookingKind::ALL
            .iter()
            .filter_map(|kind| guard.bookings.get(kind))
            .flatten()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn new_conversation(user_id: &str) -> Result<Conversation, StoreError> {
    if user_id.trim().is_empty() {
        return Err(StoreError::MissingField("user_id"));
    }
    Ok(Conversation {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        started_at: Utc::now(),
        ended_at: None,
        metadata: Map::new(),
    })
}

fn latest_open<'a>(collections: &'a Collections, user_id: &str) -> Option<&'a Conversation> {
    collections
        .conversations
        .values()
        .filter(|c| c.user_id == user_id && c.ended_at.is_none())
        .max_by_key(|c| c.started_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(user: &str, reference: &str) -> NewBooking {
        NewBooking {
            user_id: user.into(),
            booking_reference: reference.into(),
            status: "confirmed".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn emails_are_validated_and_unique() {
        let store = DocumentStore::new();
        let user = store.create_user("ada@example.com", None).await.unwrap();
        assert_eq!(
            store.find_user_by_email("ADA@example.com").await.unwrap().id,
            user.id
        );

        assert_eq!(
            store.create_user("Ada@Example.com", None).await,
            Err(StoreError::DuplicateEmail("Ada@Example.com".into()))
        );
        assert!(matches!(
            store.create_user("not-an-email", None).await,
            Err(StoreError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn messages_require_existing_conversation() {
        let store = DocumentStore::new();
        assert!(matches!(
            store.append_message("missing", MessageRole::User, "hi").await,
            Err(StoreError::ConversationNotFound(_))
        ));

        let conv = store.start_conversation("u-1").await.unwrap();
        store.append_message(&conv.id, MessageRole::User, "hi").await.unwrap();
        store
            .append_message(&conv.id, MessageRole::Assistant, "hello")
            .await
            .unwrap();

        let messages = store.conversation_messages(&conv.id).await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[tokio::test]
    async fn ended_conversation_is_not_open() {
        let store = DocumentStore::new();
        let conv = store.start_conversation("u-1").await.unwrap();
        assert_eq!(store.open_conversation("u-1").await.unwrap().id, conv.id);

        let ended = store.end_conversation(&conv.id).await.unwrap();
        assert!(ended.ended_at.is_some());
        assert!(store.open_conversation("u-1").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_turns_share_one_conversation() {
        let store = DocumentStore::new();
        let (a, b) = tokio::join!(
            store.open_or_start_conversation("u-1"),
            store.open_or_start_conversation("u-1")
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.id, b.id);

        let again = store.open_or_start_conversation("u-1").await.unwrap();
        assert_eq!(again.id, a.id);

        store.end_conversation(&a.id).await.unwrap();
        let next = store.open_or_start_conversation("u-1").await.unwrap();
        assert_ne!(next.id, a.id);

        assert!(matches!(
            store.open_or_start_conversation("  ").await,
            Err(StoreError::MissingField("user_id"))
        ));
    }

    #[tokio::test]
    async fn booking_references_are_unique_per_collection() {
        let store = DocumentStore::new();
        store
            .create_booking(BookingKind::Flight, booking("u-1", "ABC123"))
            .await
            .unwrap();

        let dup = store
            .create_booking(BookingKind::Flight, booking("u-2", "ABC123"))
            .await;
        assert_eq!(
            dup,
            Err(StoreError::DuplicateBookingReference {
                kind: BookingKind::Flight,
                reference: "ABC123".into()
            })
        );

        // same reference in another collection is fine
        store
            .create_booking(BookingKind::Hotel, booking("u-1", "ABC123"))
            .await
            .unwrap();
        assert_eq!(store.user_bookings("u-1").await.len(), 2);
        assert!(store.find_booking(BookingKind::CarRental, "ABC123").await.is_none());
    }

    #[tokio::test]
    async fn bookings_need_required_fields() {
        let store = DocumentStore::new();
        let mut missing = booking("u-1", "");
        assert_eq!(
            store.create_booking(BookingKind::Excursion, missing.clone()).await,
            Err(StoreError::MissingField("booking_reference"))
        );
        missing.booking_reference = "EX-1".into();
        missing.status.clear();
        assert_eq!(
            store.create_booking(BookingKind::Excursion, missing).await,
            Err(StoreError::MissingField("status"))
        );
    }
}
