use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use user_cell::models::ActorProfile;

use crate::models::{
    CreatePatientRequest, Patient, PatientError, UpdateMedicalInfoRequest, UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_for(
        &self,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let path = match profile {
            ActorProfile::Admin => "/rest/v1/patients?order=created_at.desc".to_string(),
            ActorProfile::Doctor(p) | ActorProfile::Receptionist(p) => format!(
                "/rest/v1/patients?clinic_id=eq.{}&order=created_at.desc",
                p.clinic_id
            ),
            ActorProfile::Patient(p) => format!("/rest/v1/patients?id=eq.{}", p.id),
            ActorProfile::Unassigned => return Ok(vec![]),
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        parse_patients(rows)
    }

    pub async fn get(
        &self,
        patient_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let patient = self.fetch(patient_id, auth_token).await?;

        let visible = match profile {
            ActorProfile::Admin => true,
            ActorProfile::Doctor(p) | ActorProfile::Receptionist(p) => {
                p.clinic_id == patient.clinic_id
            }
            ActorProfile::Patient(p) => p.id == patient.id,
            ActorProfile::Unassigned => false,
        };
        if !visible {
            return Err(PatientError::NotFound);
        }

        Ok(patient)
    }

    /// The caller's own patient file, looked up by account id.
    pub async fn my_profile(&self, user_id: &str, auth_token: &str) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        parse_patient(row)
    }

    pub async fn create(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient profile for user {}", request.user_id);

        // The linked account must exist and be a patient account.
        let users: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/users?id=eq.{}&user_type=eq.patient&select=id",
                    request.user_id
                ),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;
        if users.is_empty() {
            return Err(PatientError::UserNotFound);
        }

        if request.gender.trim().is_empty() {
            return Err(PatientError::Validation("gender is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let code_tail = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let row = json!({
            "user_id": request.user_id,
            "clinic_id": request.clinic,
            "patient_code": format!("PAT-{}", code_tail),
            "gender": request.gender,
            "blood_type": request.blood_type,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_phone": request.emergency_contact_phone,
            "emergency_contact_relationship": request.emergency_contact_relationship,
            "medical_history": request.medical_history,
            "allergies": request.allergies,
            "current_medications": request.current_medications,
            "insurance_number": request.insurance_number,
            "insurance_provider": request.insurance_provider,
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("patients", row, Some(auth_token))
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        parse_patient(created)
    }

    pub async fn update(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        self.get(patient_id, profile, auth_token).await?;

        let mut patch = Map::new();
        set_if(&mut patch, "gender", request.gender.as_ref());
        set_if(&mut patch, "blood_type", request.blood_type.as_ref());
        set_if(&mut patch, "emergency_contact_name", request.emergency_contact_name.as_ref());
        set_if(&mut patch, "emergency_contact_phone", request.emergency_contact_phone.as_ref());
        set_if(
            &mut patch,
            "emergency_contact_relationship",
            request.emergency_contact_relationship.as_ref(),
        );
        set_if(&mut patch, "medical_history", request.medical_history.as_ref());
        set_if(&mut patch, "allergies", request.allergies.as_ref());
        set_if(&mut patch, "current_medications", request.current_medications.as_ref());
        set_if(&mut patch, "insurance_number", request.insurance_number.as_ref());
        set_if(&mut patch, "insurance_provider", request.insurance_provider.as_ref());
        if let Some(active) = request.is_active {
            patch.insert("is_active".to_string(), json!(active));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "patients",
                &format!("id=eq.{}", patient_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(PatientError::NotFound)?;
        parse_patient(row)
    }

    /// Patients may edit the medical fields of their own file only; staff may
    /// edit any file visible to them.
    pub async fn update_medical_info(
        &self,
        patient_id: Uuid,
        request: UpdateMedicalInfoRequest,
        caller_user_id: &str,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let patient = self.get(patient_id, profile, auth_token).await?;

        if matches!(profile, ActorProfile::Patient(_))
            && patient.user_id.to_string() != caller_user_id
        {
            return Err(PatientError::Forbidden(
                "You do not have permission to modify this patient".to_string(),
            ));
        }

        let mut patch = Map::new();
        set_if(&mut patch, "medical_history", request.medical_history.as_ref());
        set_if(&mut patch, "allergies", request.allergies.as_ref());
        set_if(&mut patch, "current_medications", request.current_medications.as_ref());
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "patients",
                &format!("id=eq.{}", patient_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(PatientError::NotFound)?;
        parse_patient(row)
    }

    pub async fn delete(
        &self,
        patient_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        self.get(patient_id, profile, auth_token).await?;

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        Ok(())
    }

    async fn fetch(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        parse_patient(row)
    }
}

fn parse_patient(row: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(row)
        .map_err(|e| PatientError::Database(format!("Malformed patient row: {}", e)))
}

fn parse_patients(rows: Vec<Value>) -> Result<Vec<Patient>, PatientError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Patient>, _>>()
        .map_err(|e| PatientError::Database(format!("Malformed patient row: {}", e)))
}

fn set_if(patch: &mut Map<String, Value>, field: &str, value: Option<&String>) {
    if let Some(v) = value {
        patch.insert(field.to_string(), json!(v));
    }
}
