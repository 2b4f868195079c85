use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateUserRequest, UpdateUserRequest, UserError, UserListQuery};
use crate::services::{profile::ProfileService, provisioning::ProvisioningService};

fn map_user_error(e: UserError) -> AppError {
    match e {
        UserError::NotFound => AppError::NotFound("User not found".to_string()),
        err @ (UserError::DuplicateUsername | UserError::DuplicateEmail) => {
            AppError::Validation(err.to_string())
        }
        UserError::Validation(msg) => AppError::Validation(msg),
        UserError::Database(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only administrators can manage users".to_string(),
        ))
    }
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    let created = service
        .create_user(request, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "user": created,
        "message": format!("{} created successfully", created.user_type)
    })))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    let users = service
        .list_users(query.user_type, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "users": users,
        "count": users.len()
    })))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    let account = service
        .get_user(user_id, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    let account = service
        .update_user(user_id, request, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "user": account,
        "message": "User updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    service
        .delete_user(user_id, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[axum::debug_handler]
pub async fn toggle_user_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = ProvisioningService::new(&state);
    let account = service
        .toggle_status(user_id, auth.token())
        .await
        .map_err(map_user_error)?;

    let status_text = if account.is_active { "activated" } else { "deactivated" };

    Ok(Json(json!({
        "message": format!("User {} successfully", status_text),
        "is_active": account.is_active,
        "user": account
    })))
}

/// Messaging directory: every authenticated user may see the other accounts
/// so any two of them can start a conversation.
#[axum::debug_handler]
pub async fn clinic_users(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let provisioning = ProvisioningService::new(&state);
    let users = provisioning
        .list_users(None, auth.token())
        .await
        .map_err(map_user_error)?;

    let profile_service = ProfileService::new(&state);
    let profile = profile_service
        .resolve(&user, auth.token())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "users": users,
        "count": users.len(),
        "clinic": profile.clinic_id()
    })))
}
