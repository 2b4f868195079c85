use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn conversation_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/{conversation_id}",
            get(handlers::get_conversation).delete(handlers::hide_conversation),
        )
        .route(
            "/{conversation_id}/mark-read",
            post(handlers::mark_conversation_read),
        )
        .route(
            "/{conversation_id}/participants",
            post(handlers::add_participant),
        )
        .route(
            "/{conversation_id}/participants/{user_id}",
            delete(handlers::remove_participant),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn message_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_messages).post(handlers::send_message))
        .route("/{message_id}/read", post(handlers::mark_message_read))
        .route("/{message_id}", delete(handlers::delete_message))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
