use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Message, MessagingError, SendMessageRequest};
use crate::services::conversation::{parse_messages, ConversationService};

pub struct MessageService {
    supabase: SupabaseClient,
    conversations: ConversationService,
}

impl MessageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            conversations: ConversationService::new(config),
        }
    }

    /// Persist a new message and unhide the conversation for every
    /// participant. Per-message deletion markers are deliberately left
    /// untouched: only the new message becomes visible to users who had
    /// deleted the older ones.
    pub async fn send(
        &self,
        caller: Uuid,
        request: SendMessageRequest,
        auth_token: &str,
    ) -> Result<Message, MessagingError> {
        if request.content.trim().is_empty() {
            return Err(MessagingError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let conversation = self.conversations.fetch(request.conversation, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "conversation_id": request.conversation,
            "sender_id": caller,
            "content": request.content,
            "deleted_for": [],
            "is_read": false,
            "read_at": null,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("messages", row, Some(auth_token))
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let message: Message = serde_json::from_value(created)
            .map_err(|e| MessagingError::Database(format!("Malformed message row: {}", e)))?;

        // New activity resurfaces the conversation for everyone who had
        // hidden it, and bumps it to the top of the inbox.
        self.supabase
            .update(
                "conversations",
                &format!("id=eq.{}", request.conversation),
                json!({
                    "hidden_for": [],
                    "updated_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        info!(
            "Message {} sent in conversation {}",
            message.id, request.conversation
        );
        Ok(message)
    }

    /// The caller's view of a conversation: everything they have not
    /// deleted, oldest first.
    pub async fn list(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Message>, MessagingError> {
        let conversation = self.conversations.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        let path = format!(
            "/rest/v1/messages?conversation_id=eq.{}&deleted_for=not.cs.{{{}}}&order=created_at.asc",
            conversation_id, caller
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        parse_messages(rows)
    }

    /// Mark one message read. Senders cannot mark their own messages: that
    /// case is a no-op, not an error.
    pub async fn mark_read(
        &self,
        message_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<Message, MessagingError> {
        let message = self.fetch(message_id, auth_token).await?;

        let conversation = self
            .conversations
            .fetch(message.conversation_id, auth_token)
            .await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        if message.sender_id == caller {
            return Ok(message);
        }

        let updated = self
            .supabase
            .update(
                "messages",
                &format!("id=eq.{}", message_id),
                json!({
                    "is_read": true,
                    "read_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(MessagingError::MessageNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| MessagingError::Database(format!("Malformed message row: {}", e)))
    }

    /// Remove the message from the caller's view only. Idempotent: deleting
    /// twice changes nothing.
    pub async fn delete_for(
        &self,
        message_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<Message, MessagingError> {
        let message = self.fetch(message_id, auth_token).await?;

        let conversation = self
            .conversations
            .fetch(message.conversation_id, auth_token)
            .await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        if message.deleted_for_user(caller) {
            debug!("Message {} already deleted for {}", message_id, caller);
            return Ok(message);
        }

        let mut deleted_for = message.deleted_for.clone();
        deleted_for.push(caller);

        let updated = self
            .supabase
            .update(
                "messages",
                &format!("id=eq.{}", message_id),
                json!({ "deleted_for": deleted_for }),
                Some(auth_token),
            )
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(MessagingError::MessageNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| MessagingError::Database(format!("Malformed message row: {}", e)))
    }

    async fn fetch(&self, message_id: Uuid, auth_token: &str) -> Result<Message, MessagingError> {
        let path = format!("/rest/v1/messages?id=eq.{}", message_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(MessagingError::MessageNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| MessagingError::Database(format!("Malformed message row: {}", e)))
    }
}
