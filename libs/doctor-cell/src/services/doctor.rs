use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use user_cell::models::ActorProfile;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_for(
        &self,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = match profile {
            ActorProfile::Admin => "/rest/v1/doctors?order=created_at.desc".to_string(),
            ActorProfile::Doctor(p) => format!("/rest/v1/doctors?id=eq.{}", p.id),
            // Patients browse the doctors of their own clinic to book with.
            ActorProfile::Receptionist(p) | ActorProfile::Patient(p) => format!(
                "/rest/v1/doctors?clinic_id=eq.{}&order=created_at.desc",
                p.clinic_id
            ),
            ActorProfile::Unassigned => return Ok(vec![]),
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        parse_doctors(rows)
    }

    pub async fn get(
        &self,
        doctor_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.fetch(doctor_id, auth_token).await?;

        let visible = match profile {
            ActorProfile::Admin => true,
            ActorProfile::Doctor(p) => p.id == doctor.id,
            ActorProfile::Receptionist(p) | ActorProfile::Patient(p) => {
                p.clinic_id == doctor.clinic_id
            }
            ActorProfile::Unassigned => false,
        };
        if !visible {
            return Err(DoctorError::NotFound);
        }

        Ok(doctor)
    }

    pub async fn create(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for user {}", request.user_id);

        let users: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/users?id=eq.{}&user_type=eq.doctor&select=id",
                    request.user_id
                ),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;
        if users.is_empty() {
            return Err(DoctorError::UserNotFound);
        }

        for (field, value) in [
            ("specialization", &request.specialization),
            ("license_number", &request.license_number),
            ("education", &request.education),
        ] {
            if value.trim().is_empty() {
                return Err(DoctorError::Validation(format!("{} is required", field)));
            }
        }

        let now = Utc::now().to_rfc3339();
        let code_tail = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let row = json!({
            "user_id": request.user_id,
            "clinic_id": request.clinic,
            "doctor_code": format!("DOC-{}", code_tail),
            "specialization": request.specialization,
            "license_number": request.license_number,
            "years_of_experience": request.years_of_experience,
            "education": request.education,
            "certifications": request.certifications,
            "consultation_fee": request.consultation_fee,
            "available_days": request.available_days.clone().unwrap_or_else(|| vec![
                "Monday".to_string(), "Tuesday".to_string(), "Wednesday".to_string(),
                "Thursday".to_string(), "Friday".to_string(),
            ]),
            "available_hours": request.available_hours.clone()
                .unwrap_or_else(|| json!({"start": "09:00", "end": "17:00"})),
            "is_available": request.is_available.unwrap_or(true),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("doctors", row, Some(auth_token))
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        parse_doctor(created)
    }

    pub async fn update(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        self.get(doctor_id, profile, auth_token).await?;

        let mut patch = Map::new();
        if let Some(specialization) = &request.specialization {
            patch.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(license_number) = &request.license_number {
            patch.insert("license_number".to_string(), json!(license_number));
        }
        if let Some(years) = request.years_of_experience {
            patch.insert("years_of_experience".to_string(), json!(years));
        }
        if let Some(education) = &request.education {
            patch.insert("education".to_string(), json!(education));
        }
        if let Some(certifications) = &request.certifications {
            patch.insert("certifications".to_string(), json!(certifications));
        }
        if let Some(fee) = request.consultation_fee {
            patch.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(days) = &request.available_days {
            patch.insert("available_days".to_string(), json!(days));
        }
        if let Some(hours) = &request.available_hours {
            patch.insert("available_hours".to_string(), hours.clone());
        }
        if let Some(available) = request.is_available {
            patch.insert("is_available".to_string(), json!(available));
        }
        if let Some(active) = request.is_active {
            patch.insert("is_active".to_string(), json!(active));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "doctors",
                &format!("id=eq.{}", doctor_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(DoctorError::NotFound)?;
        parse_doctor(row)
    }

    pub async fn delete(
        &self,
        doctor_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        self.get(doctor_id, profile, auth_token).await?;

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(())
    }

    async fn fetch(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        parse_doctor(row)
    }
}

fn parse_doctor(row: Value) -> Result<Doctor, DoctorError> {
    serde_json::from_value(row)
        .map_err(|e| DoctorError::Database(format!("Malformed doctor row: {}", e)))
}

fn parse_doctors(rows: Vec<Value>) -> Result<Vec<Doctor>, DoctorError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Doctor>, _>>()
        .map_err(|e| DoctorError::Database(format!("Malformed doctor row: {}", e)))
}
