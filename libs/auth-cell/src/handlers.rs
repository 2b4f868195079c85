use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;
use user_cell::services::{profile::ProfileService, provisioning::ProvisioningService};

// Token issuance lives with the auth collaborator; these endpoints only
// validate what it issued and expose the caller's identity.

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

#[axum::debug_handler]
pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

#[axum::debug_handler]
pub async fn verify(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = extract_bearer_token(&headers)?;

    let valid = validate_token(&token, &config.supabase_jwt_secret).is_ok();
    Ok(Json(json!({ "valid": valid })))
}

/// The caller's account row plus the resolved role profile.
#[axum::debug_handler]
pub async fn profile(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let token = extract_bearer_token(&headers)?;

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Malformed user id in token".to_string()))?;

    let account = ProvisioningService::new(&state)
        .get_user(user_id, &token)
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    let profile = ProfileService::new(&state)
        .resolve(&user, &token)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "user": account,
        "role": user.role,
        "clinic": profile.clinic_id()
    })))
}
