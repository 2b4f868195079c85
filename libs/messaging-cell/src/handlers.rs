use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateConversationRequest, MessageListQuery, MessagingError, ParticipantRequest,
    SendMessageRequest,
};
use crate::services::{conversation::ConversationService, message::MessageService};

fn map_messaging_error(e: MessagingError) -> AppError {
    match e {
        MessagingError::ConversationNotFound => {
            AppError::NotFound("Conversation not found".to_string())
        }
        MessagingError::MessageNotFound => AppError::NotFound("Message not found".to_string()),
        err @ MessagingError::NotParticipant => AppError::Forbidden(err.to_string()),
        MessagingError::Validation(msg) => AppError::Validation(msg),
        MessagingError::Database(msg) => AppError::Database(msg),
    }
}

fn caller_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Malformed user id in token".to_string()))
}

// ==============================================================================
// CONVERSATION HANDLERS
// ==============================================================================

/// 201 for a newly created conversation, 200 when an existing conversation
/// with the same participant set is returned instead.
#[axum::debug_handler]
pub async fn create_conversation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let (conversation, created) = service
        .create_or_reuse(caller, request, auth.token())
        .await
        .map_err(map_messaging_error)?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!(conversation))))
}

#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let conversations = service
        .list(caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!({
        "conversations": conversations,
        "count": conversations.len()
    })))
}

#[axum::debug_handler]
pub async fn get_conversation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let conversation = service
        .get(conversation_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!(conversation)))
}

/// "Delete" from the caller's point of view: hides the conversation and
/// marks its current messages deleted for the caller. Shared rows survive.
#[axum::debug_handler]
pub async fn hide_conversation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    service
        .hide_for(conversation_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!({ "message": "Conversation hidden successfully" })))
}

#[axum::debug_handler]
pub async fn mark_conversation_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let count = service
        .mark_read(conversation_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!({
        "message": format!("{} messages marked as read", count)
    })))
}

#[axum::debug_handler]
pub async fn add_participant(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let conversation = service
        .add_participant(conversation_id, caller, request.user_id, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!(conversation)))
}

#[axum::debug_handler]
pub async fn remove_participant(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((conversation_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = ConversationService::new(&state);
    let conversation = service
        .remove_participant(conversation_id, caller, user_id, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!(conversation)))
}

// ==============================================================================
// MESSAGE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller = caller_id(&user)?;

    let service = MessageService::new(&state);
    let message = service
        .send(caller, request, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok((StatusCode::CREATED, Json(json!(message))))
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let Some(conversation_id) = query.conversation else {
        return Err(AppError::Validation(
            "The conversation query parameter is required".to_string(),
        ));
    };

    let service = MessageService::new(&state);
    let messages = service
        .list(conversation_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!({
        "messages": messages,
        "count": messages.len()
    })))
}

#[axum::debug_handler]
pub async fn mark_message_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = MessageService::new(&state);
    let message = service
        .mark_read(message_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!(message)))
}

/// Delete-for-me: the message disappears from the caller's view only.
#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_id(&user)?;

    let service = MessageService::new(&state);
    service
        .delete_for(message_id, caller, auth.token())
        .await
        .map_err(map_messaging_error)?;

    Ok(Json(json!({ "message": "Message deleted successfully" })))
}
