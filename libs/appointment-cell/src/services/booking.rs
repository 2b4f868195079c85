use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use user_cell::models::ActorProfile;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::{resolve_duration, ConflictValidator};

/// Appointment writes. Every create or reschedule runs the duration policy
/// and the conflict validator before the store is touched.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    conflict: ConflictValidator,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict = ConflictValidator::new(Arc::clone(&supabase));
        Self { supabase, conflict }
    }

    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} at {}",
            request.patient, request.doctor, request.appointment_date
        );

        if let Some(d) = request.duration {
            if d <= 0 {
                return Err(AppointmentError::Validation(
                    "duration must be a positive number of minutes".to_string(),
                ));
            }
        }

        let service_duration = self.service_duration(request.service, auth_token).await?;
        let duration = resolve_duration(service_duration, request.duration);

        self.conflict
            .ensure_no_conflict(request.doctor, request.appointment_date, duration, None, auth_token)
            .await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "patient_id": request.patient,
            "doctor_id": request.doctor,
            "clinic_id": request.clinic,
            "service_id": request.service,
            "appointment_date": request.appointment_date.to_rfc3339(),
            "duration": duration,
            "status": request.status.unwrap_or(AppointmentStatus::Scheduled).to_string(),
            "reason": request.reason,
            "notes": request.notes,
            "reminder_sent": false,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("appointments", row, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        parse_appointment(created)
    }

    pub async fn update(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.get(appointment_id, profile, auth_token).await?;

        if let Some(d) = request.duration {
            if d <= 0 {
                return Err(AppointmentError::Validation(
                    "duration must be a positive number of minutes".to_string(),
                ));
            }
        }

        let doctor_id = request.doctor.unwrap_or(existing.doctor_id);
        let appointment_date = request.appointment_date.unwrap_or(existing.appointment_date);

        // Same policy as on create: the target service's duration wins, then
        // the supplied value, then what the row already had.
        let target_service = request.service.or(existing.service_id);
        let service_duration = self.service_duration(target_service, auth_token).await?;
        let duration = resolve_duration(
            service_duration,
            request.duration.or(Some(existing.duration)),
        );

        if request.reschedules() {
            self.conflict
                .ensure_no_conflict(
                    doctor_id,
                    appointment_date,
                    duration,
                    Some(appointment_id),
                    auth_token,
                )
                .await?;
        }

        let mut patch = Map::new();
        if let Some(doctor) = request.doctor {
            patch.insert("doctor_id".to_string(), json!(doctor));
        }
        if let Some(service) = request.service {
            patch.insert("service_id".to_string(), json!(service));
        }
        if let Some(date) = request.appointment_date {
            patch.insert("appointment_date".to_string(), json!(date.to_rfc3339()));
        }
        if request.reschedules() {
            patch.insert("duration".to_string(), json!(duration));
        }
        if let Some(status) = request.status {
            patch.insert("status".to_string(), json!(status.to_string()));
        }
        if let Some(reason) = &request.reason {
            patch.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = &request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "appointments",
                &format!("id=eq.{}", appointment_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(AppointmentError::NotFound)?;
        parse_appointment(row)
    }

    pub async fn list_for(
        &self,
        profile: &ActorProfile,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = match profile {
            ActorProfile::Admin => "/rest/v1/appointments?".to_string(),
            ActorProfile::Doctor(p) => format!("/rest/v1/appointments?doctor_id=eq.{}&", p.id),
            ActorProfile::Receptionist(p) => {
                format!("/rest/v1/appointments?clinic_id=eq.{}&", p.clinic_id)
            }
            ActorProfile::Patient(p) => format!("/rest/v1/appointments?patient_id=eq.{}&", p.id),
            ActorProfile::Unassigned => return Ok(vec![]),
        };

        if let Some(status) = query.status {
            path.push_str(&format!("status=eq.{}&", status));
        }
        path.push_str("order=appointment_date.desc");

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        parse_appointments(rows)
    }

    /// The caller's own calendar: a patient's or a doctor's appointments.
    /// Other roles get an empty list here and use the scoped listing instead.
    pub async fn my_appointments(
        &self,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = match profile {
            ActorProfile::Doctor(p) => format!(
                "/rest/v1/appointments?doctor_id=eq.{}&order=appointment_date.desc",
                p.id
            ),
            ActorProfile::Patient(p) => format!(
                "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.desc",
                p.id
            ),
            _ => return Ok(vec![]),
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        parse_appointments(rows)
    }

    pub async fn get(
        &self,
        appointment_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let appointment = parse_appointment(row)?;

        if !appointment.visible_to(profile) {
            return Err(AppointmentError::NotFound);
        }

        Ok(appointment)
    }

    async fn service_duration(
        &self,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<i32>, AppointmentError> {
        let Some(service_id) = service_id else {
            return Ok(None);
        };

        let path = format!("/rest/v1/services?id=eq.{}&select=duration", service_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let duration = rows
            .first()
            .and_then(|row| row["duration"].as_i64())
            .map(|d| d as i32);

        if let Some(d) = duration {
            debug!("Resolved service {} duration: {} minutes", service_id, d);
        }
        Ok(duration)
    }
}

fn parse_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::Database(format!("Malformed appointment row: {}", e)))
}

fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| AppointmentError::Database(format!("Malformed appointment row: {}", e)))
}
