use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use user_cell::models::ActorProfile;

use crate::models::{CareService, ClinicError, CreateServiceRequest, UpdateServiceRequest};

const DEFAULT_SERVICE_DURATION: i32 = 30;

/// Service catalog per clinic. Names are unique within a clinic.
pub struct CatalogService {
    supabase: SupabaseClient,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_for(
        &self,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<Vec<CareService>, ClinicError> {
        let path = match profile {
            ActorProfile::Admin => "/rest/v1/services?order=name.asc".to_string(),
            ActorProfile::Unassigned => return Ok(vec![]),
            ActorProfile::Doctor(p) | ActorProfile::Receptionist(p) | ActorProfile::Patient(p) => {
                format!("/rest/v1/services?clinic_id=eq.{}&order=name.asc", p.clinic_id)
            }
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        parse_services(rows)
    }

    pub async fn get(
        &self,
        service_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<CareService, ClinicError> {
        let service = self.fetch(service_id, auth_token).await?;

        let visible = match profile {
            ActorProfile::Admin => true,
            ActorProfile::Unassigned => false,
            _ => profile.clinic_id() == Some(service.clinic_id),
        };
        if !visible {
            return Err(ClinicError::ServiceNotFound);
        }

        Ok(service)
    }

    pub async fn create(
        &self,
        request: CreateServiceRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<CareService, ClinicError> {
        debug!("Creating service {} for clinic {}", request.name, request.clinic);

        // Receptionists may only add services to their own clinic.
        if let ActorProfile::Receptionist(p) = profile {
            if p.clinic_id != request.clinic {
                return Err(ClinicError::Forbidden(
                    "You can only create services for your own clinic".to_string(),
                ));
            }
        }

        if request.name.trim().is_empty() {
            return Err(ClinicError::Validation("Service name is required".to_string()));
        }

        if let Some(duration) = request.duration {
            if duration <= 0 {
                return Err(ClinicError::Validation(
                    "Service duration must be a positive number of minutes".to_string(),
                ));
            }
        }

        self.ensure_unique_name(request.clinic, &request.name, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "clinic_id": request.clinic,
            "name": request.name,
            "service_type": request.service_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "consultation".to_string()),
            "description": request.description,
            "duration": request.duration.unwrap_or(DEFAULT_SERVICE_DURATION),
            "price": request.price.unwrap_or(0.0),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("services", row, Some(auth_token))
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| ClinicError::Database(format!("Malformed service row: {}", e)))
    }

    pub async fn update(
        &self,
        service_id: Uuid,
        request: UpdateServiceRequest,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<CareService, ClinicError> {
        let current = self.get(service_id, profile, auth_token).await?;

        if let Some(duration) = request.duration {
            if duration <= 0 {
                return Err(ClinicError::Validation(
                    "Service duration must be a positive number of minutes".to_string(),
                ));
            }
        }

        if let Some(name) = &request.name {
            if name != &current.name {
                self.ensure_unique_name(current.clinic_id, name, auth_token).await?;
            }
        }

        let mut patch = Map::new();
        if let Some(name) = &request.name {
            patch.insert("name".to_string(), json!(name));
        }
        if let Some(service_type) = request.service_type {
            patch.insert("service_type".to_string(), json!(service_type.to_string()));
        }
        if let Some(description) = &request.description {
            patch.insert("description".to_string(), json!(description));
        }
        if let Some(duration) = request.duration {
            patch.insert("duration".to_string(), json!(duration));
        }
        if let Some(price) = request.price {
            patch.insert("price".to_string(), json!(price));
        }
        if let Some(active) = request.is_active {
            patch.insert("is_active".to_string(), json!(active));
        }
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "services",
                &format!("id=eq.{}", service_id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(ClinicError::ServiceNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ClinicError::Database(format!("Malformed service row: {}", e)))
    }

    pub async fn delete(
        &self,
        service_id: Uuid,
        profile: &ActorProfile,
        auth_token: &str,
    ) -> Result<(), ClinicError> {
        self.get(service_id, profile, auth_token).await?;

        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    async fn ensure_unique_name(
        &self,
        clinic_id: Uuid,
        name: &str,
        auth_token: &str,
    ) -> Result<(), ClinicError> {
        let path = format!(
            "/rest/v1/services?clinic_id=eq.{}&name=eq.{}&select=id",
            clinic_id, name
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        if !rows.is_empty() {
            return Err(ClinicError::Validation(format!(
                "A service named \"{}\" already exists in this clinic",
                name
            )));
        }
        Ok(())
    }

    async fn fetch(&self, service_id: Uuid, auth_token: &str) -> Result<CareService, ClinicError> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(ClinicError::ServiceNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ClinicError::Database(format!("Malformed service row: {}", e)))
    }
}

fn parse_services(rows: Vec<Value>) -> Result<Vec<CareService>, ClinicError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<CareService>, _>>()
        .map_err(|e| ClinicError::Database(format!("Malformed service row: {}", e)))
}
