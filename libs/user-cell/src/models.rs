use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// ACCOUNT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Admin,
    Doctor,
    Receptionist,
    Patient,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::Doctor => write!(f, "doctor"),
            UserType::Receptionist => write!(f, "receptionist"),
            UserType::Patient => write!(f, "patient"),
        }
    }
}

/// Account row. Credentials are held by the auth collaborator; this table
/// only carries identity and role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ==============================================================================
// ACTOR PROFILE RESOLUTION
// ==============================================================================

/// Role profile row reference: enough to scope queries without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub id: Uuid,
    pub clinic_id: Uuid,
}

/// The caller's resolved role profile, established once per request. A user
/// whose role profile row is missing resolves to `Unassigned`, which scopes
/// every query to the empty set instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorProfile {
    Admin,
    Doctor(ProfileRef),
    Receptionist(ProfileRef),
    Patient(ProfileRef),
    Unassigned,
}

impl ActorProfile {
    pub fn clinic_id(&self) -> Option<Uuid> {
        match self {
            ActorProfile::Doctor(p)
            | ActorProfile::Receptionist(p)
            | ActorProfile::Patient(p) => Some(p.clinic_id),
            ActorProfile::Admin | ActorProfile::Unassigned => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ActorProfile::Admin)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Admin provisioning payload: the account fields plus the role-profile
/// fields for whichever user_type is being created. Everything the profile
/// does not need is simply left out by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub clinic: Option<Uuid>,

    // Doctor profile fields
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<Vec<String>>,
    pub available_hours: Option<Value>,
    pub is_available: Option<bool>,

    // Receptionist profile fields
    pub shift_start: Option<String>,
    pub shift_end: Option<String>,
    pub working_days: Option<Vec<String>>,
    pub permissions: Option<Value>,

    // Patient profile fields
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub insurance_number: Option<String>,
    pub insurance_provider: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,

    // Doctor profile fields
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<Vec<String>>,
    pub available_hours: Option<Value>,
    pub is_available: Option<bool>,

    // Receptionist profile fields
    pub shift_start: Option<String>,
    pub shift_end: Option<String>,
    pub working_days: Option<Vec<String>>,
    pub permissions: Option<Value>,

    // Patient profile fields
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub insurance_number: Option<String>,
    pub insurance_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub user_type: Option<UserType>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("This username already exists")]
    DuplicateUsername,

    #[error("This email already exists")]
    DuplicateEmail,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}
