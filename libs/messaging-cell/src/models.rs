use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CONVERSATION MODELS
// ==============================================================================

/// Shared conversation row. `hidden_for` is the per-user visibility layer:
/// hiding removes the conversation from that user's list without touching
/// what other participants see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub subject: String,
    pub participants: Vec<Uuid>,
    pub hidden_for: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn hidden_for_user(&self, user_id: Uuid) -> bool {
        self.hidden_for.contains(&user_id)
    }

    /// Identity key: the participant set, order-insensitive.
    pub fn sorted_participants(&self) -> Vec<Uuid> {
        let mut ids = self.participants.clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// The participant set a new conversation will be keyed by: the requested
/// users plus the caller, sorted and deduplicated.
pub fn normalize_participants(requested: &[Uuid], caller: Uuid) -> Vec<Uuid> {
    let mut ids = requested.to_vec();
    if !ids.contains(&caller) {
        ids.push(caller);
    }
    ids.sort();
    ids.dedup();
    ids
}

// ==============================================================================
// MESSAGE MODELS
// ==============================================================================

/// Shared message row. `deleted_for` is independent of the conversation's
/// `hidden_for`: unhiding a conversation never restores deleted messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub deleted_for: Vec<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn deleted_for_user(&self, user_id: Uuid) -> bool {
        self.deleted_for.contains(&user_id)
    }
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub user_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastMessagePreview {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation as rendered in a user's inbox: the row plus participant
/// details, a preview of the latest message, and the caller's unread count.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants_data: Vec<ParticipantInfo>,
    pub last_message: Option<LastMessagePreview>,
    pub unread_count: usize,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    pub clinic: Uuid,
    pub subject: String,
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub conversation: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub conversation: Option<Uuid>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("You are not a participant of this conversation")]
    NotParticipant,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn caller_is_added_to_the_participant_set() {
        let normalized = normalize_participants(&[uuid(2), uuid(3)], uuid(1));
        assert_eq!(normalized, vec![uuid(1), uuid(2), uuid(3)]);
    }

    #[test]
    fn normalization_is_order_insensitive() {
        let a = normalize_participants(&[uuid(3), uuid(1)], uuid(2));
        let b = normalize_participants(&[uuid(1), uuid(2)], uuid(3));
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_collapse() {
        let normalized = normalize_participants(&[uuid(2), uuid(2), uuid(1)], uuid(1));
        assert_eq!(normalized, vec![uuid(1), uuid(2)]);
    }
}
