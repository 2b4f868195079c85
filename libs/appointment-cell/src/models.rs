use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use user_cell::models::ActorProfile;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub duration: i32,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// End of the booked interval; the interval is half-open, the end
    /// instant itself is free.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.appointment_date + chrono::Duration::minutes(self.duration as i64)
    }

    pub fn visible_to(&self, profile: &ActorProfile) -> bool {
        match profile {
            ActorProfile::Admin => true,
            ActorProfile::Doctor(p) => p.id == self.doctor_id,
            ActorProfile::Receptionist(p) => p.clinic_id == self.clinic_id,
            ActorProfile::Patient(p) => p.id == self.patient_id,
            ActorProfile::Unassigned => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that keep the doctor's time blocked; everything else is
    /// ignored by the conflict check and the slot grid.
    pub fn blocks_schedule(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::InProgress
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient: Uuid,
    pub doctor: Uuid,
    pub clinic: Uuid,
    pub service: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub duration: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor: Option<Uuid>,
    pub service: Option<Uuid>,
    pub appointment_date: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    /// Whether the request moves the appointment on the calendar, which is
    /// what forces re-validation against the doctor's other bookings.
    pub fn reschedules(&self) -> bool {
        self.doctor.is_some()
            || self.service.is_some()
            || self.appointment_date.is_some()
            || self.duration.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
}

/// Raw query parameters of the slot lookup. Identifiers that fail to parse
/// resolve to an empty slot list rather than an error.
#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub service_id: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("The appointment date cannot be in the past")]
    PastDate,

    #[error("The doctor already has an appointment from {start} to {end}. Please choose another slot")]
    Conflict { start: String, end: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}
