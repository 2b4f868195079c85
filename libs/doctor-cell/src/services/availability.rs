use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableSlot, Doctor, DoctorError, WorkingHours};

/// Candidate cadence. Slots start every 30 minutes from the window opening,
/// independent of the requested duration.
const SLOT_INTERVAL_MINUTES: i64 = 30;

const DEFAULT_SLOT_DURATION: i32 = 30;

/// Statuses that block a time interval for a doctor.
pub const ACTIVE_STATUSES: &str = "scheduled,confirmed,in_progress";

#[derive(Debug, Deserialize)]
struct BookedInterval {
    appointment_date: DateTime<Utc>,
    duration: i32,
}

/// Computes the bookable start times for a doctor on a given date. Purely a
/// read: nothing here mutates the store.
pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, DoctorError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        // An unknown or unavailable doctor yields an empty list, not an error.
        let Some(doctor) = self.fetch_doctor(doctor_id, auth_token).await? else {
            debug!("Doctor {} not found, no slots", doctor_id);
            return Ok(vec![]);
        };
        if !doctor.accepts_bookings() {
            debug!("Doctor {} is not taking bookings, no slots", doctor_id);
            return Ok(vec![]);
        }

        let duration = self.resolve_duration(service_id, auth_token).await;
        let booked = self.booked_intervals(doctor_id, date, auth_token).await?;

        let slots = compute_slots(date, doctor.working_hours(), duration, Utc::now(), &booked);
        debug!("Found {} available slots", slots.len());

        Ok(slots
            .into_iter()
            .map(|time| AvailableSlot { time, available: true })
            .collect())
    }

    /// Slot duration follows the requested service when it resolves to a row
    /// with a positive duration; everything else falls back to the default.
    async fn resolve_duration(&self, service_id: Option<Uuid>, auth_token: &str) -> i32 {
        let Some(service_id) = service_id else {
            return DEFAULT_SLOT_DURATION;
        };

        let path = format!("/rest/v1/services?id=eq.{}&select=duration", service_id);
        let rows: Vec<Value> = match self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
        {
            Ok(rows) => rows,
            Err(_) => return DEFAULT_SLOT_DURATION,
        };

        rows.first()
            .and_then(|row| row["duration"].as_i64())
            .map(|d| d as i32)
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_SLOT_DURATION)
    }

    async fn booked_intervals(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, DoctorError> {
        let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = day_start + Duration::days(1);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=gte.{}&appointment_date=lt.{}&status=in.({})&select=appointment_date,duration&order=appointment_date.asc",
            doctor_id,
            day_start.to_rfc3339(),
            day_end.to_rfc3339(),
            ACTIVE_STATUSES
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let intervals = rows
            .into_iter()
            .map(|row| serde_json::from_value::<BookedInterval>(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DoctorError::Database(format!("Malformed appointment row: {}", e)))?;

        Ok(intervals
            .into_iter()
            .map(|apt| {
                let end = apt.appointment_date + Duration::minutes(apt.duration as i64);
                (apt.appointment_date, end)
            })
            .collect())
    }

    async fn fetch_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| DoctorError::Database(format!("Malformed doctor row: {}", e)))
            })
            .transpose()
    }
}

/// The slot grid for one day: candidates at a fixed cadence from the window
/// opening, kept when they are in the future, fit inside the window, and do
/// not overlap a booked interval. Intervals are half-open, so a slot may
/// start exactly when a booking ends.
pub fn compute_slots(
    date: NaiveDate,
    hours: WorkingHours,
    duration_minutes: i32,
    now: DateTime<Utc>,
    booked: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<DateTime<Utc>> {
    let window_start = date.and_time(hours.start).and_utc();
    let window_end = date.and_time(hours.end).and_utc();
    let duration = Duration::minutes(duration_minutes as i64);

    let mut slots = Vec::new();
    let mut candidate = window_start;

    while candidate < window_end {
        let candidate_end = candidate + duration;

        if candidate > now && candidate_end <= window_end {
            let blocked = booked
                .iter()
                .any(|(start, end)| candidate < *end && candidate_end > *start);
            if !blocked {
                slots.push(candidate);
            }
        }

        candidate += Duration::minutes(SLOT_INTERVAL_MINUTES);
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn hours(start: (u32, u32), end: (u32, u32)) -> WorkingHours {
        WorkingHours {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2031, 6, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        day().and_hms_opt(h, m, 0).unwrap().and_utc()
    }

    fn long_ago() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2031, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn full_day_grid_runs_on_half_hour_cadence() {
        let slots = compute_slots(day(), hours((9, 0), (17, 0)), 30, long_ago(), &[]);

        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0], at(9, 0));
        assert_eq!(slots[1], at(9, 30));
        assert_eq!(*slots.last().unwrap(), at(16, 30));
    }

    #[test]
    fn booked_interval_removes_only_overlapping_candidates() {
        let booked = vec![(at(10, 0), at(10, 30))];
        let slots = compute_slots(day(), hours((9, 0), (17, 0)), 30, long_ago(), &booked);

        assert_eq!(slots.len(), 15);
        assert!(!slots.contains(&at(10, 0)));
        assert!(slots.contains(&at(9, 0)));
        assert!(slots.contains(&at(9, 30)));
        // Half-open intervals: the 10:30 slot may start as the booking ends.
        assert!(slots.contains(&at(10, 30)));
        assert!(slots.contains(&at(11, 0)));
        assert!(slots.contains(&at(16, 30)));
    }

    #[test]
    fn longer_duration_blocks_neighbouring_candidates() {
        let booked = vec![(at(10, 0), at(10, 30))];
        let slots = compute_slots(day(), hours((9, 0), (17, 0)), 60, long_ago(), &booked);

        // A 60-minute visit starting 09:30 would run into the 10:00 booking.
        assert!(!slots.contains(&at(9, 30)));
        assert!(!slots.contains(&at(10, 0)));
        assert!(slots.contains(&at(9, 0)));
        assert!(slots.contains(&at(10, 30)));
        // And the tail of the day can no longer fit a full hour.
        assert!(!slots.contains(&at(16, 30)));
        assert!(slots.contains(&at(16, 0)));
    }

    #[test]
    fn candidates_must_fit_inside_the_window() {
        let slots = compute_slots(day(), hours((9, 0), (10, 15)), 30, long_ago(), &[]);

        // 10:00 + 30min would spill past 10:15.
        assert_eq!(slots, vec![at(9, 0), at(9, 30)]);
    }

    #[test]
    fn past_candidates_are_dropped() {
        let now = at(12, 10);
        let slots = compute_slots(day(), hours((9, 0), (17, 0)), 30, now, &[]);

        assert_eq!(slots[0], at(12, 30));
    }

    #[test]
    fn cadence_is_independent_of_duration() {
        let slots = compute_slots(day(), hours((9, 0), (17, 0)), 45, long_ago(), &[]);

        // Still every 30 minutes, just with a shorter tail.
        assert_eq!(slots[0], at(9, 0));
        assert_eq!(slots[1], at(9, 30));
        assert_eq!(*slots.last().unwrap(), at(16, 0));
    }

    #[test]
    fn inverted_window_yields_no_slots() {
        let slots = compute_slots(day(), hours((17, 0), (9, 0)), 30, long_ago(), &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn evening_window_from_config_is_respected() {
        let slots = compute_slots(day(), hours((21, 0), (23, 0)), 30, long_ago(), &[]);

        assert_eq!(slots.first().copied(), Some(at(21, 0)));
        assert_eq!(slots.last().copied(), Some(at(22, 30)));
        assert!(slots.iter().all(|s| *s >= at(21, 0) && *s < at(23, 0)));
    }
}
