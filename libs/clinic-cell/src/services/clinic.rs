use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use user_cell::models::ActorProfile;

use crate::models::{Clinic, ClinicError, CreateClinicRequest, UpdateClinicRequest};

const PHONE_PATTERN: &str = r"^\+?1?\d{9,15}$";

pub struct ClinicService {
    supabase: SupabaseClient,
}

impl ClinicService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Unauthenticated listing used by the registration flow.
    pub async fn list_public(&self) -> Result<Vec<Clinic>, ClinicError> {
        let path = "/rest/v1/clinics?order=name.asc";
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        parse_clinics(rows)
    }

    pub async fn list_for(
        &self,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Vec<Clinic>, ClinicError> {
        let path = match profile {
            ActorProfile::Admin => "/rest/v1/clinics?order=name.asc".to_string(),
            ActorProfile::Unassigned => return Ok(vec![]),
            ActorProfile::Doctor(p) | ActorProfile::Receptionist(p) | ActorProfile::Patient(p) => {
                format!("/rest/v1/clinics?id=eq.{}", p.clinic_id)
            }
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        parse_clinics(rows)
    }

    pub async fn get(
        &self,
        clinic_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        let clinic = self.fetch(clinic_id, auth_token).await?;

        let visible = match profile {
            ActorProfile::Admin => true,
            ActorProfile::Unassigned => false,
            _ => profile.clinic_id() == Some(clinic.id),
        };
        if !visible {
            return Err(ClinicError::ClinicNotFound);
        }

        Ok(clinic)
    }

    pub async fn create(
        &self,
        request: CreateClinicRequest,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        debug!("Creating clinic: {}", request.name);

        if request.name.trim().is_empty() {
            return Err(ClinicError::Validation("Clinic name is required".to_string()));
        }
        validate_phone(&request.phone_number)?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "name": request.name,
            "address": request.address,
            "city": request.city,
            "postal_code": request.postal_code,
            "country": request.country,
            "phone_number": request.phone_number,
            "email": request.email,
            "website": request.website,
            "description": request.description,
            "opening_hours": request.opening_hours.unwrap_or_else(|| json!({})),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("clinics", row, Some(auth_token))
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| ClinicError::Database(format!("Malformed clinic row: {}", e)))
    }

    pub async fn update(
        &self,
        clinic_id: Uuid,
        request: UpdateClinicRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        // Staff may only edit their own clinic; admin may edit any.
        match profile {
            ActorProfile::Admin => {}
            ActorProfile::Receptionist(p) if p.clinic_id == clinic_id => {}
            _ => {
                return Err(ClinicError::Forbidden(
                    "You do not have permission to modify this clinic".to_string(),
                ))
            }
        }

        if let Some(phone) = &request.phone_number {
            validate_phone(phone)?;
        }

        let mut patch = Map::new();
        set_if(&mut patch, "name", request.name.as_ref());
        set_if(&mut patch, "address", request.address.as_ref());
        set_if(&mut patch, "city", request.city.as_ref());
        set_if(&mut patch, "postal_code", request.postal_code.as_ref());
        set_if(&mut patch, "country", request.country.as_ref());
        set_if(&mut patch, "phone_number", request.phone_number.as_ref());
        set_if(&mut patch, "email", request.email.as_ref());
        set_if(&mut patch, "website", request.website.as_ref());
        set_if(&mut patch, "description", request.description.as_ref());
        if let Some(hours) = &request.opening_hours {
            patch.insert("opening_hours".to_string(), hours.clone());
        }
        if let Some(active) = request.is_active {
            patch.insert("is_active".to_string(), json!(active));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "clinics",
                &format!("id=eq.{}", clinic_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(ClinicError::ClinicNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ClinicError::Database(format!("Malformed clinic row: {}", e)))
    }

    pub async fn delete(&self, clinic_id: Uuid, auth_token: &str) -> Result<(), ClinicError> {
        self.fetch(clinic_id, auth_token).await?;

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    async fn fetch(&self, clinic_id: Uuid, auth_token: &str) -> Result<Clinic, ClinicError> {
        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(ClinicError::ClinicNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ClinicError::Database(format!("Malformed clinic row: {}", e)))
    }
}

fn parse_clinics(rows: Vec<Value>) -> Result<Vec<Clinic>, ClinicError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Clinic>, _>>()
        .map_err(|e| ClinicError::Database(format!("Malformed clinic row: {}", e)))
}

fn validate_phone(phone: &str) -> Result<(), ClinicError> {
    let pattern = Regex::new(PHONE_PATTERN).expect("phone pattern is valid");
    if pattern.is_match(phone) {
        Ok(())
    } else {
        Err(ClinicError::Validation(
            "Phone number must be in the format '+999999999', up to 15 digits".to_string(),
        ))
    }
}

fn set_if(patch: &mut Map<String, Value>, field: &str, value: Option<&String>) {
    if let Some(v) = value {
        patch.insert(field.to_string(), json!(v));
    }
}
