use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone_number: String,
    pub email: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub opening_hours: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClinicRequest {
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone_number: String,
    pub email: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub opening_hours: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClinicRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub opening_hours: Option<Value>,
    pub is_active: Option<bool>,
}

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Consultation,
    Checkup,
    Surgery,
    Therapy,
    Vaccination,
    Dental,
    Other,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceType::Consultation => "consultation",
            ServiceType::Checkup => "checkup",
            ServiceType::Surgery => "surgery",
            ServiceType::Therapy => "therapy",
            ServiceType::Vaccination => "vaccination",
            ServiceType::Dental => "dental",
            ServiceType::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// A bookable service offered by a clinic. Its duration drives appointment
/// durations whenever a booking references the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareService {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub service_type: ServiceType,
    pub description: Option<String>,
    pub duration: i32,
    pub price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub clinic: Uuid,
    pub name: String,
    pub service_type: Option<ServiceType>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub service_type: Option<ServiceType>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub price: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}
