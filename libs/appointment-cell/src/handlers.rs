use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use user_cell::services::profile::ProfileService;

use crate::models::{
    AppointmentError, AppointmentListQuery, CreateAppointmentRequest, SlotQuery,
    UpdateAppointmentRequest,
};
use crate::services::{booking::BookingService, lifecycle::LifecycleService};

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        err @ AppointmentError::PastDate => AppError::Validation(err.to_string()),
        err @ AppointmentError::Conflict { .. } => AppError::Conflict(err.to_string()),
        AppointmentError::Validation(msg) => AppError::Validation(msg),
        AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
        AppointmentError::Database(msg) => AppError::Database(msg),
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

/// Slot lookup for the booking calendar. Identifiers that do not resolve
/// yield an empty list; only missing parameters are an error.
#[axum::debug_handler]
pub async fn available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let (Some(doctor_raw), Some(date_raw)) = (query.doctor_id, query.date) else {
        return Err(AppError::Validation(
            "doctor_id and date are required".to_string(),
        ));
    };

    let doctor_id = Uuid::parse_str(&doctor_raw).ok();
    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").ok();
    let (Some(doctor_id), Some(date)) = (doctor_id, date) else {
        return Ok(Json(json!({ "slots": [] })));
    };

    let service_id = query.service_id.and_then(|s| Uuid::parse_str(&s).ok());

    let availability = AvailabilityService::new(&state);
    let slots = availability
        .available_slots(doctor_id, date, service_id, auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({ "slots": slots })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .create(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = BookingService::new(&state);
    let appointment = service
        .update(appointment_id, request, &profile, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = BookingService::new(&state);
    let appointments = service
        .list_for(&profile, &query, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = BookingService::new(&state);
    let appointments = service
        .my_appointments(&profile, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = BookingService::new(&state);
    let appointment = service
        .get(appointment_id, &profile, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = LifecycleService::new(&state);
    let appointment = service
        .confirm(appointment_id, &user, &profile, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = resolve_profile(&state, &user, auth.token()).await?;

    let service = LifecycleService::new(&state);
    let appointment = service
        .cancel(appointment_id, &user, &profile, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}
