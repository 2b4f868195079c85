use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::AppointmentError;

pub const DEFAULT_APPOINTMENT_DURATION: i32 = 30;

/// Statuses that block a doctor's calendar, as a PostgREST `in.` list.
pub const ACTIVE_STATUSES: &str = "scheduled,confirmed,in_progress";

/// Duration policy, applied the same way on create and on update: a service
/// with a positive duration always wins, then the explicitly supplied value,
/// then the default.
pub fn resolve_duration(service_duration: Option<i32>, requested: Option<i32>) -> i32 {
    match service_duration {
        Some(d) if d > 0 => d,
        _ => match requested {
            Some(d) if d > 0 => d,
            _ => DEFAULT_APPOINTMENT_DURATION,
        },
    }
}

/// Half-open interval intersection: [s1, e1) and [s2, e2) overlap iff
/// s1 < e2 && s2 < e1. Touching endpoints do not conflict.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

#[derive(Debug, Deserialize)]
struct ActiveAppointment {
    appointment_date: DateTime<Utc>,
    duration: i32,
}

/// Guards the one real invariant of the calendar: a doctor's active
/// appointments never overlap.
pub struct ConflictValidator {
    supabase: Arc<SupabaseClient>,
}

impl ConflictValidator {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Reject the candidate interval when it starts in the past or overlaps
    /// another active appointment of the same doctor. The appointment being
    /// updated is excluded from the comparison via `exclude_id`.
    pub async fn ensure_no_conflict(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i32,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        if start < Utc::now() {
            return Err(AppointmentError::PastDate);
        }

        let end = start + Duration::minutes(duration_minutes as i64);
        debug!(
            "Checking conflicts for doctor {} over [{}, {})",
            doctor_id, start, end
        );

        let existing = self.active_appointments(doctor_id, exclude_id, auth_token).await?;

        for apt in existing {
            let apt_end = apt.appointment_date + Duration::minutes(apt.duration as i64);
            if intervals_overlap(start, end, apt.appointment_date, apt_end) {
                warn!(
                    "Conflict for doctor {}: requested [{}, {}) against [{}, {})",
                    doctor_id, start, end, apt.appointment_date, apt_end
                );
                return Err(AppointmentError::Conflict {
                    start: apt.appointment_date.format("%H:%M").to_string(),
                    end: apt_end.format("%H:%M").to_string(),
                });
            }
        }

        Ok(())
    }

    async fn active_appointments(
        &self,
        doctor_id: Uuid,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<ActiveAppointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.({})&select=appointment_date,duration&order=appointment_date.asc",
            doctor_id, ACTIVE_STATUSES
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ActiveAppointment>, _>>()
            .map_err(|e| AppointmentError::Database(format!("Malformed appointment row: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2031, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn service_duration_overrides_everything() {
        assert_eq!(resolve_duration(Some(45), Some(60)), 45);
        assert_eq!(resolve_duration(Some(45), None), 45);
    }

    #[test]
    fn requested_duration_applies_without_a_service() {
        assert_eq!(resolve_duration(None, Some(60)), 60);
        assert_eq!(resolve_duration(Some(0), Some(60)), 60);
    }

    #[test]
    fn default_duration_is_the_last_resort() {
        assert_eq!(resolve_duration(None, None), 30);
        assert_eq!(resolve_duration(Some(0), None), 30);
        assert_eq!(resolve_duration(None, Some(0)), 30);
    }

    #[test]
    fn overlapping_intervals_are_detected() {
        // [10:15, 10:45) against [10:00, 10:30)
        assert!(intervals_overlap(at(10, 15), at(10, 45), at(10, 0), at(10, 30)));
        // Containment
        assert!(intervals_overlap(at(10, 0), at(11, 0), at(10, 15), at(10, 30)));
        // Identity
        assert!(intervals_overlap(at(10, 0), at(10, 30), at(10, 0), at(10, 30)));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        assert!(!intervals_overlap(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
        assert!(!intervals_overlap(at(9, 30), at(10, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!intervals_overlap(at(9, 0), at(9, 30), at(14, 0), at(14, 30)));
    }
}
