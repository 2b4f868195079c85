use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Point the store client at a wiremock server.
    pub fn with_mock_store(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// Canned PostgREST rows for wiremock responses. Field shapes mirror the
/// entity models exactly; tests override what they care about.
pub struct MockRows;

impl MockRows {
    pub fn user(id: &str, user_type: &str) -> serde_json::Value {
        json!({
            "id": id,
            "username": "jdoe",
            "email": "jdoe@example.com",
            "first_name": "Jane",
            "last_name": "Doe",
            "user_type": user_type,
            "phone_number": "+21612345678",
            "date_of_birth": "1990-01-01",
            "address": null,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn clinic(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Downtown Clinic",
            "address": "1 Main St",
            "city": "Tunis",
            "postal_code": "1000",
            "country": "TN",
            "phone_number": "+21671000000",
            "email": "clinic@example.com",
            "website": null,
            "description": null,
            "opening_hours": {},
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor(id: &str, user_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": user_id,
            "clinic_id": clinic_id,
            "doctor_code": "DOC-A1B2C3D4",
            "specialization": "General Practice",
            "license_number": "MD-123456",
            "years_of_experience": 10,
            "education": "Medical University",
            "certifications": null,
            "consultation_fee": 80.0,
            "available_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "available_hours": {"start": "09:00", "end": "17:00"},
            "is_available": true,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient(id: &str, user_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": user_id,
            "clinic_id": clinic_id,
            "patient_code": "PAT-A1B2C3D4",
            "gender": "F",
            "blood_type": "O+",
            "emergency_contact_name": "John Doe",
            "emergency_contact_phone": "+21698765432",
            "emergency_contact_relationship": "spouse",
            "medical_history": null,
            "allergies": null,
            "current_medications": null,
            "insurance_number": null,
            "insurance_provider": null,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn receptionist(id: &str, user_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": user_id,
            "clinic_id": clinic_id,
            "employee_code": "EMP-A1B2C3D4",
            "shift_start": "08:00:00",
            "shift_end": "17:00:00",
            "working_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "permissions": {},
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service(id: &str, clinic_id: &str, duration: i32) -> serde_json::Value {
        json!({
            "id": id,
            "clinic_id": clinic_id,
            "name": "Consultation",
            "service_type": "consultation",
            "description": null,
            "duration": duration,
            "price": 50.0,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment(
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        clinic_id: &str,
        appointment_date: &str,
        duration: i32,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "service_id": null,
            "appointment_date": appointment_date,
            "duration": duration,
            "status": status,
            "reason": null,
            "notes": null,
            "reminder_sent": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn conversation(
        id: &str,
        clinic_id: &str,
        participants: &[&str],
        hidden_for: &[&str],
    ) -> serde_json::Value {
        json!({
            "id": id,
            "clinic_id": clinic_id,
            "subject": "Follow-up",
            "participants": participants,
            "hidden_for": hidden_for,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn message(
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        deleted_for: &[&str],
    ) -> serde_json::Value {
        json!({
            "id": id,
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": "Hello",
            "deleted_for": deleted_for,
            "is_read": false,
            "read_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_points_at_mock_store() {
        let config = TestConfig::with_mock_store("http://127.0.0.1:9999");
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://127.0.0.1:9999");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_token_has_three_segments() {
        let user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&user, "secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
