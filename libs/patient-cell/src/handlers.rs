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
    CreatePatientRequest, PatientError, UpdateMedicalInfoRequest, UpdatePatientRequest,
};
use crate::services::patient::PatientService;

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::UserNotFound => AppError::Validation("Patient user not found".to_string()),
        PatientError::Validation(msg) => AppError::Validation(msg),
        PatientError::Forbidden(msg) => AppError::Forbidden(msg),
        PatientError::Database(msg) => AppError::Database(msg),
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
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    let patients = service
        .list_for(&profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patients": patients,
        "count": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    let patient = service
        .get(patient_id, &profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service
        .my_profile(&user.id, auth.token())
        .await
        .map_err(|_| AppError::NotFound("Patient profile not found".to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to create a patient".to_string(),
        ));
    }

    let service = PatientService::new(&state);
    let patient = service
        .create(request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    let patient = service
        .update(patient_id, request, &profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !matches!(user.role.as_deref(), Some("admin" | "receptionist")) {
        return Err(AppError::Forbidden(
            "You do not have permission to delete a patient".to_string(),
        ));
    }

    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    service
        .delete(patient_id, &profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({ "message": "Patient deleted successfully" })))
}

#[axum::debug_handler]
pub async fn medical_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    let patient = service
        .get(patient_id, &profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patient_code": patient.patient_code,
        "medical_history": patient.medical_history,
        "allergies": patient.allergies,
        "current_medications": patient.current_medications,
        "blood_type": patient.blood_type
    })))
}

#[axum::debug_handler]
pub async fn update_medical_info(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdateMedicalInfoRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = PatientService::new(&state);
    let patient = service
        .update_medical_info(patient_id, request, &user.id, &profile, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}
