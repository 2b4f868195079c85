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

use crate::models::{
    ClinicError, CreateClinicRequest, CreateServiceRequest, UpdateClinicRequest,
    UpdateServiceRequest,
};
use crate::services::{catalog::CatalogService, clinic::ClinicService};

fn map_clinic_error(e: ClinicError) -> AppError {
    match e {
        ClinicError::ClinicNotFound => AppError::NotFound("Clinic not found".to_string()),
        ClinicError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        ClinicError::Validation(msg) => AppError::Validation(msg),
        ClinicError::Forbidden(msg) => AppError::Forbidden(msg),
        ClinicError::Database(msg) => AppError::Database(msg),
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

// ==============================================================================
// CLINIC HANDLERS
// ==============================================================================

/// Public listing so the registration form can offer a clinic choice.
#[axum::debug_handler]
pub async fn list_clinics_public(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);
    let clinics = service.list_public().await.map_err(map_clinic_error)?;

    Ok(Json(json!({
        "clinics": clinics,
        "count": clinics.len()
    })))
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = ClinicService::new(&state);
    let clinic = service
        .get(clinic_id, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn create_clinic(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can create a clinic".to_string(),
        ));
    }

    let service = ClinicService::new(&state);
    let clinic = service
        .create(request, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn update_clinic(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
    Json(request): Json<UpdateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = ClinicService::new(&state);
    let clinic = service
        .update(clinic_id, request, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn delete_clinic(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can delete a clinic".to_string(),
        ));
    }

    let service = ClinicService::new(&state);
    service
        .delete(clinic_id, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({ "message": "Clinic deleted successfully" })))
}

// ==============================================================================
// SERVICE CATALOG HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let catalog = CatalogService::new(&state);
    let services = catalog
        .list_for(&profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "services": services,
        "count": services.len()
    })))
}

#[axum::debug_handler]
pub async fn get_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let catalog = CatalogService::new(&state);
    let service = catalog
        .get(service_id, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to create a service".to_string(),
        ));
    }

    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let catalog = CatalogService::new(&state);
    let service = catalog
        .create(request, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to modify a service".to_string(),
        ));
    }

    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let catalog = CatalogService::new(&state);
    let service = catalog
        .update(service_id, request, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to delete a service".to_string(),
        ));
    }

    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let catalog = CatalogService::new(&state);
    catalog
        .delete(service_id, &profile, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({ "message": "Service deleted successfully" })))
}
