use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_code: String,
    pub specialization: String,
    pub license_number: String,
    pub years_of_experience: i32,
    pub education: String,
    pub certifications: Option<String>,
    pub consultation_fee: f64,
    pub available_days: Vec<String>,
    /// Raw working-hours config, `{"start": "HH:MM", "end": "HH:MM"}`.
    /// Interpreted through [`WorkingHours::from_config`], never trusted.
    pub available_hours: Value,
    pub is_available: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn working_hours(&self) -> WorkingHours {
        WorkingHours::from_config(&self.available_hours)
    }

    /// Whether any slot may be offered for this doctor at all.
    pub fn accepts_bookings(&self) -> bool {
        self.is_available && self.is_active
    }
}

/// A doctor's daily working window. Configuration that is absent or
/// malformed silently resolves to the 09:00-17:00 default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }
    }
}

impl WorkingHours {
    pub fn from_config(config: &Value) -> Self {
        let start = config.get("start").and_then(Value::as_str).and_then(parse_hhmm);
        let end = config.get("end").and_then(Value::as_str).and_then(parse_hhmm);

        match (start, end) {
            (Some(start), Some(end)) => Self { start, end },
            _ => Self::default(),
        }
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// A bookable start time offered to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub time: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub clinic: Uuid,
    pub specialization: String,
    pub license_number: String,
    pub years_of_experience: i32,
    pub education: String,
    pub certifications: Option<String>,
    pub consultation_fee: f64,
    pub available_days: Option<Vec<String>>,
    pub available_hours: Option<Value>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<Vec<String>>,
    pub available_hours: Option<Value>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor user not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn working_hours_parse_well_formed_config() {
        let hours = WorkingHours::from_config(&json!({"start": "21:00", "end": "23:00"}));
        assert_eq!(hours.start, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(hours.end, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    }

    #[test]
    fn working_hours_default_on_missing_config() {
        assert_eq!(WorkingHours::from_config(&json!(null)), WorkingHours::default());
        assert_eq!(WorkingHours::from_config(&json!({})), WorkingHours::default());
    }

    #[test]
    fn working_hours_default_on_malformed_config() {
        assert_eq!(
            WorkingHours::from_config(&json!({"start": "nine", "end": "17:00"})),
            WorkingHours::default()
        );
        assert_eq!(
            WorkingHours::from_config(&json!({"start": 9, "end": 17})),
            WorkingHours::default()
        );
        assert_eq!(
            WorkingHours::from_config(&json!({"start": "09:00"})),
            WorkingHours::default()
        );
    }
}
