use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use user_cell::services::profile::ProfileService;

use crate::models::{CreateDoctorRequest, DoctorError, UpdateDoctorRequest};
use crate::services::doctor::DoctorService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::UserNotFound => AppError::Validation("Doctor user not found".to_string()),
        DoctorError::Validation(msg) => AppError::Validation(msg),
        DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

async fn resolve_profile(
    state: &AppConfig,
    user: &User,
    token: &str,
) -> Result<user_cell::models::ActorProfile, AppError> {
    ProfileService::new(state)
        .resolve(user, token)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = DoctorService::new(&state);
    let doctors = service
        .list_for(&profile, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "count": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = DoctorService::new(&state);
    let doctor = service
        .get(doctor_id, &profile, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to create a doctor".to_string(),
        ));
    }

    let service = DoctorService::new(&state);
    let doctor = service
        .create(request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = DoctorService::new(&state);
    let doctor = service
        .update(doctor_id, request, &profile, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can delete a doctor".to_string(),
        ));
    }

    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = DoctorService::new(&state);
    service
        .delete(doctor_id, &profile, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "message": "Doctor deleted successfully" })))
}
