use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use user_cell::models::ActorProfile;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::booking::BookingService;

/// Role-gated status transitions. Confirmation is a staff action; patients
/// may cancel, but only their own appointments.
pub struct LifecycleService {
    supabase: SupabaseClient,
    booking: BookingService,
}

impl LifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            booking: BookingService::new(config),
        }
    }

    pub async fn confirm(
        &self,
        appointment_id: Uuid,
        user: &User,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if !user.is_staff() {
            return Err(AppointmentError::Forbidden(
                "You do not have permission to confirm an appointment".to_string(),
            ));
        }

        // Scope check: staff can only reach appointments they can see.
        self.booking.get(appointment_id, profile, auth_token).await?;

        info!("Confirming appointment {}", appointment_id);
        self.set_status(appointment_id, AppointmentStatus::Confirmed, auth_token)
            .await
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.booking.get(appointment_id, profile, auth_token).await?;

        match profile {
            ActorProfile::Patient(p) => {
                if appointment.patient_id != p.id {
                    return Err(AppointmentError::Forbidden(
                        "You do not have permission to cancel this appointment".to_string(),
                    ));
                }
            }
            _ => {
                if !user.is_staff() {
                    return Err(AppointmentError::Forbidden(
                        "You do not have permission to cancel an appointment".to_string(),
                    ));
                }
            }
        }

        info!("Cancelling appointment {}", appointment_id);
        self.set_status(appointment_id, AppointmentStatus::Cancelled, auth_token)
            .await
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patch = json!({
            "status": status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated = self
            .supabase
            .update(
                "appointments",
                &format!("id=eq.{}", appointment_id),
                patch,
                Some(auth_token),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Malformed appointment row: {}", e)))
    }
}
