use std::collections::HashMap;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    normalize_participants, Conversation, ConversationSummary, CreateConversationRequest,
    LastMessagePreview, Message, MessagingError, ParticipantInfo,
};

pub struct ConversationService {
    supabase: SupabaseClient,
}

impl ConversationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a conversation, or return the existing one keyed by the same
    /// (clinic, participant set) identity. The boolean is true when a new
    /// row was created.
    pub async fn create_or_reuse(
        &self,
        caller: Uuid,
        request: CreateConversationRequest,
        auth_token: &str,
    ) -> Result<(Conversation, bool), MessagingError> {
        if request.participants.len() < 2 {
            return Err(MessagingError::Validation(
                "A conversation must have at least 2 participants".to_string(),
            ));
        }

        let participants = normalize_participants(&request.participants, caller);

        // Identity is (clinic, exact participant set): compare against every
        // active conversation of the clinic by sorted set.
        let path = format!(
            "/rest/v1/conversations?clinic_id=eq.{}&is_active=eq.true",
            request.clinic
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;
        let existing = parse_conversations(rows)?;

        for conversation in existing {
            if conversation.sorted_participants() == participants {
                debug!(
                    "Reusing conversation {} for participant set",
                    conversation.id
                );
                return Ok((conversation, false));
            }
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "clinic_id": request.clinic,
            "subject": request.subject,
            "participants": participants,
            "hidden_for": [],
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("conversations", row, Some(auth_token))
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let conversation = parse_conversation(created)?;
        info!("Created conversation {}", conversation.id);
        Ok((conversation, true))
    }

    /// The caller's inbox: conversations they participate in, minus the ones
    /// they have hidden.
    pub async fn list(
        &self,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let path = format!(
            "/rest/v1/conversations?participants=cs.{{{}}}&hidden_for=not.cs.{{{}}}&is_active=eq.true&order=updated_at.desc",
            caller, caller
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let conversations = parse_conversations(rows)?;
        self.build_summaries(conversations, caller, auth_token).await
    }

    pub async fn get(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<ConversationSummary, MessagingError> {
        let conversation = self.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        let mut summaries = self
            .build_summaries(vec![conversation], caller, auth_token)
            .await?;
        Ok(summaries.remove(0))
    }

    /// User-initiated "delete conversation": hide it for the caller and mark
    /// every currently existing message as deleted for them, so a later
    /// unhide does not resurface old history.
    pub async fn hide_for(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<(), MessagingError> {
        let conversation = self.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        if !conversation.hidden_for_user(caller) {
            let mut hidden_for = conversation.hidden_for.clone();
            hidden_for.push(caller);

            self.supabase
                .update(
                    "conversations",
                    &format!("id=eq.{}", conversation_id),
                    json!({ "hidden_for": hidden_for }),
                    Some(auth_token),
                )
                .await
                .map_err(|e| MessagingError::Database(e.to_string()))?;
        }

        // Per-message deletion markers stay independent of the hidden set;
        // they are what keeps old messages away after an unhide.
        let messages = self.conversation_messages(conversation_id, auth_token).await?;
        for message in messages {
            if message.deleted_for_user(caller) {
                continue;
            }
            let mut deleted_for = message.deleted_for.clone();
            deleted_for.push(caller);

            self.supabase
                .update(
                    "messages",
                    &format!("id=eq.{}", message.id),
                    json!({ "deleted_for": deleted_for }),
                    Some(auth_token),
                )
                .await
                .map_err(|e| MessagingError::Database(e.to_string()))?;
        }

        info!("Conversation {} hidden for {}", conversation_id, caller);
        Ok(())
    }

    /// Mark every unread message authored by someone else as read. Returns
    /// how many messages were touched.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<usize, MessagingError> {
        let conversation = self.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        let updated = self
            .supabase
            .update(
                "messages",
                &format!(
                    "conversation_id=eq.{}&is_read=eq.false&sender_id=neq.{}",
                    conversation_id, caller
                ),
                json!({
                    "is_read": true,
                    "read_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        Ok(updated.len())
    }

    pub async fn add_participant(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Conversation, MessagingError> {
        let conversation = self.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        if conversation.is_participant(user_id) {
            return Ok(conversation);
        }

        let mut participants = conversation.participants.clone();
        participants.push(user_id);
        self.set_participants(conversation_id, participants, auth_token).await
    }

    pub async fn remove_participant(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Conversation, MessagingError> {
        let conversation = self.fetch(conversation_id, auth_token).await?;
        if !conversation.is_participant(caller) {
            return Err(MessagingError::NotParticipant);
        }

        let participants: Vec<Uuid> = conversation
            .participants
            .iter()
            .copied()
            .filter(|id| *id != user_id)
            .collect();
        self.set_participants(conversation_id, participants, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    async fn set_participants(
        &self,
        conversation_id: Uuid,
        participants: Vec<Uuid>,
        auth_token: &str,
    ) -> Result<Conversation, MessagingError> {
        let updated = self
            .supabase
            .update(
                "conversations",
                &format!("id=eq.{}", conversation_id),
                json!({
                    "participants": participants,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let row = updated
            .into_iter()
            .next()
            .ok_or(MessagingError::ConversationNotFound)?;
        parse_conversation(row)
    }

    pub(crate) async fn fetch(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Conversation, MessagingError> {
        let path = format!("/rest/v1/conversations?id=eq.{}", conversation_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(MessagingError::ConversationNotFound)?;
        parse_conversation(row)
    }

    async fn conversation_messages(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Message>, MessagingError> {
        let path = format!(
            "/rest/v1/messages?conversation_id=eq.{}&order=created_at.asc",
            conversation_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        parse_messages(rows)
    }

    async fn build_summaries(
        &self,
        conversations: Vec<Conversation>,
        caller: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let directory = self.participant_directory(&conversations, auth_token).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = self.conversation_messages(conversation.id, auth_token).await?;

            let last_message = messages.last().map(|m| LastMessagePreview {
                id: m.id,
                sender_id: m.sender_id,
                content: m.content.chars().take(100).collect(),
                created_at: m.created_at,
            });

            let unread_count = messages
                .iter()
                .filter(|m| !m.is_read && m.sender_id != caller)
                .count();

            let participants_data = conversation
                .participants
                .iter()
                .filter_map(|id| directory.get(id).cloned())
                .collect();

            summaries.push(ConversationSummary {
                conversation,
                participants_data,
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }

    async fn participant_directory(
        &self,
        conversations: &[Conversation],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, ParticipantInfo>, MessagingError> {
        let mut ids: Vec<Uuid> = conversations
            .iter()
            .flat_map(|c| c.participants.iter().copied())
            .collect();
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/users?id=in.({})&select=id,first_name,last_name,email,user_type",
            id_list
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| MessagingError::Database(e.to_string()))?;

        let mut directory = HashMap::new();
        for row in rows {
            let Some(id) = row["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()) else {
                continue;
            };
            directory.insert(
                id,
                ParticipantInfo {
                    id,
                    name: format!(
                        "{} {}",
                        row["first_name"].as_str().unwrap_or(""),
                        row["last_name"].as_str().unwrap_or("")
                    )
                    .trim()
                    .to_string(),
                    email: row["email"].as_str().unwrap_or("").to_string(),
                    user_type: row["user_type"].as_str().unwrap_or("").to_string(),
                },
            );
        }

        Ok(directory)
    }
}

pub(crate) fn parse_conversation(row: Value) -> Result<Conversation, MessagingError> {
    serde_json::from_value(row)
        .map_err(|e| MessagingError::Database(format!("Malformed conversation row: {}", e)))
}

fn parse_conversations(rows: Vec<Value>) -> Result<Vec<Conversation>, MessagingError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Conversation>, _>>()
        .map_err(|e| MessagingError::Database(format!("Malformed conversation row: {}", e)))
}

pub(crate) fn parse_messages(rows: Vec<Value>) -> Result<Vec<Message>, MessagingError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Message>, _>>()
        .map_err(|e| MessagingError::Database(format!("Malformed message row: {}", e)))
}
