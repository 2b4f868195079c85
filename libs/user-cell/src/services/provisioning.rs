use chrono::{NaiveTime, Utc};
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateUserRequest, UpdateUserRequest, UserAccount, UserError, UserType};

const PHONE_PATTERN: &str = r"^\+?1?\d{9,15}$";

/// Admin-only account provisioning: creates the account row plus the role
/// profile for the requested user_type. A failure in the profile step rolls
/// the account back so no user exists without its profile.
pub struct ProvisioningService {
    supabase: SupabaseClient,
}

impl ProvisioningService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        debug!("Provisioning {} account: {}", request.user_type, request.username);

        self.validate_account_fields(&request)?;
        self.ensure_unique(&request, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let account_row = json!({
            "username": request.username,
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "user_type": request.user_type.to_string(),
            "phone_number": request.phone_number,
            "date_of_birth": request.date_of_birth,
            "address": request.address,
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let created = self
            .supabase
            .insert("users", account_row, Some(auth_token))
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        let user: UserAccount = serde_json::from_value(created)
            .map_err(|e| UserError::Database(format!("Malformed user row: {}", e)))?;

        // Any profile failure must delete the account created above.
        if let Err(e) = self.create_role_profile(&user, &request, auth_token).await {
            warn!("Profile creation failed for {}, rolling back account", user.id);
            self.rollback_account(user.id, auth_token).await;
            return Err(e);
        }

        debug!("Provisioned user {} ({})", user.id, user.user_type);
        Ok(user)
    }

    pub async fn list_users(
        &self,
        user_type: Option<UserType>,
        auth_token: &str,
    ) -> Result<Vec<UserAccount>, UserError> {
        let mut path = "/rest/v1/users?order=created_at.desc".to_string();
        if let Some(filter) = user_type {
            path.push_str(&format!("&user_type=eq.{}", filter));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row))
            .collect::<Result<Vec<UserAccount>, _>>()
            .map_err(|e| UserError::Database(format!("Malformed user row: {}", e)))
    }

    pub async fn get_user(&self, user_id: Uuid, auth_token: &str) -> Result<UserAccount, UserError> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(UserError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| UserError::Database(format!("Malformed user row: {}", e)))
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        let current = self.get_user(user_id, auth_token).await?;

        if let Some(phone) = &request.phone_number {
            validate_phone(phone)?;
        }

        let mut account_patch = Map::new();
        set_if(&mut account_patch, "first_name", request.first_name.as_ref());
        set_if(&mut account_patch, "last_name", request.last_name.as_ref());
        set_if(&mut account_patch, "email", request.email.as_ref());
        set_if(&mut account_patch, "phone_number", request.phone_number.as_ref());
        set_if(&mut account_patch, "address", request.address.as_ref());
        if let Some(dob) = request.date_of_birth {
            account_patch.insert("date_of_birth".to_string(), json!(dob));
        }
        account_patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .supabase
            .update(
                "users",
                &format!("id=eq.{}", user_id),
                Value::Object(account_patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        self.update_role_profile(&current, &request, auth_token).await?;

        let row = updated.into_iter().next().ok_or(UserError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| UserError::Database(format!("Malformed user row: {}", e)))
    }

    pub async fn delete_user(&self, user_id: Uuid, auth_token: &str) -> Result<(), UserError> {
        // Ensure the row exists so a bogus id surfaces as NotFound.
        self.get_user(user_id, auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn toggle_status(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        let current = self.get_user(user_id, auth_token).await?;

        let patch = json!({
            "is_active": !current.is_active,
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated = self
            .supabase
            .update("users", &format!("id=eq.{}", user_id), patch, Some(auth_token))
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(UserError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| UserError::Database(format!("Malformed user row: {}", e)))
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    fn validate_account_fields(&self, request: &CreateUserRequest) -> Result<(), UserError> {
        for (field, value) in [
            ("username", &request.username),
            ("email", &request.email),
            ("first_name", &request.first_name),
            ("last_name", &request.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(UserError::Validation(format!(
                    "The field \"{}\" is required",
                    field
                )));
            }
        }

        match &request.phone_number {
            Some(phone) => validate_phone(phone)?,
            None => {
                return Err(UserError::Validation(
                    "The field \"phone_number\" is required".to_string(),
                ))
            }
        }

        if request.date_of_birth.is_none() {
            return Err(UserError::Validation(
                "The field \"date_of_birth\" is required".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_unique(
        &self,
        request: &CreateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        let by_username: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/users?username=eq.{}&select=id", request.username),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;
        if !by_username.is_empty() {
            return Err(UserError::DuplicateUsername);
        }

        let by_email: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/users?email=eq.{}&select=id", request.email),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;
        if !by_email.is_empty() {
            return Err(UserError::DuplicateEmail);
        }

        Ok(())
    }

    async fn create_role_profile(
        &self,
        user: &UserAccount,
        request: &CreateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        match user.user_type {
            UserType::Admin => Ok(()),
            UserType::Doctor => self.create_doctor_profile(user, request, auth_token).await,
            UserType::Receptionist => {
                self.create_receptionist_profile(user, request, auth_token).await
            }
            UserType::Patient => self.create_patient_profile(user, request, auth_token).await,
        }
    }

    async fn create_doctor_profile(
        &self,
        user: &UserAccount,
        request: &CreateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        let clinic_id = request
            .clinic
            .ok_or_else(|| UserError::Validation("A clinic is required for a doctor".to_string()))?;

        let specialization = require_text(&request.specialization, "specialization is required for a doctor")?;
        let license_number = require_text(&request.license_number, "license_number is required for a doctor")?;
        let education = require_text(&request.education, "education is required for a doctor")?;
        let years_of_experience = request.years_of_experience.ok_or_else(|| {
            UserError::Validation("years_of_experience is required for a doctor".to_string())
        })?;
        let consultation_fee = request.consultation_fee.ok_or_else(|| {
            UserError::Validation("consultation_fee is required for a doctor".to_string())
        })?;

        self.ensure_clinic_exists(clinic_id, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "user_id": user.id,
            "clinic_id": clinic_id,
            "doctor_code": profile_code("DOC"),
            "specialization": specialization,
            "license_number": license_number,
            "years_of_experience": years_of_experience,
            "education": education,
            "certifications": request.certifications.as_deref().unwrap_or("").trim(),
            "consultation_fee": consultation_fee,
            "available_days": request.available_days.clone().unwrap_or_else(default_weekdays),
            "available_hours": request.available_hours.clone()
                .unwrap_or_else(|| json!({"start": "09:00", "end": "17:00"})),
            "is_available": request.is_available.unwrap_or(true),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        self.supabase
            .insert("doctors", row, Some(auth_token))
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;
        Ok(())
    }

    async fn create_receptionist_profile(
        &self,
        user: &UserAccount,
        request: &CreateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        let clinic_id = request.clinic.ok_or_else(|| {
            UserError::Validation("A clinic is required for a receptionist".to_string())
        })?;

        self.ensure_clinic_exists(clinic_id, auth_token).await?;

        let shift_start = parse_shift(request.shift_start.as_deref(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        let shift_end = parse_shift(request.shift_end.as_deref(), NaiveTime::from_hms_opt(17, 0, 0).unwrap());

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "user_id": user.id,
            "clinic_id": clinic_id,
            "employee_code": profile_code("EMP"),
            "shift_start": shift_start.format("%H:%M:%S").to_string(),
            "shift_end": shift_end.format("%H:%M:%S").to_string(),
            "working_days": request.working_days.clone().unwrap_or_else(default_weekdays),
            "permissions": request.permissions.clone().unwrap_or_else(|| json!({})),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        self.supabase
            .insert("receptionists", row, Some(auth_token))
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;
        Ok(())
    }

    async fn create_patient_profile(
        &self,
        user: &UserAccount,
        request: &CreateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        let clinic_id = request
            .clinic
            .ok_or_else(|| UserError::Validation("A clinic is required for a patient".to_string()))?;

        let gender = require_text(&request.gender, "gender is required for a patient")?;
        let contact_name = require_text(
            &request.emergency_contact_name,
            "emergency_contact_name is required",
        )?;
        let contact_phone = require_text(
            &request.emergency_contact_phone,
            "emergency_contact_phone is required",
        )?;
        let contact_relationship = require_text(
            &request.emergency_contact_relationship,
            "emergency_contact_relationship is required",
        )?;

        self.ensure_clinic_exists(clinic_id, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "user_id": user.id,
            "clinic_id": clinic_id,
            "patient_code": profile_code("PAT"),
            "gender": gender,
            "blood_type": request.blood_type,
            "emergency_contact_name": contact_name,
            "emergency_contact_phone": contact_phone,
            "emergency_contact_relationship": contact_relationship,
            "medical_history": request.medical_history.as_deref().unwrap_or("").trim(),
            "allergies": request.allergies.as_deref().unwrap_or("").trim(),
            "current_medications": request.current_medications.as_deref().unwrap_or("").trim(),
            "insurance_number": request.insurance_number.as_deref().unwrap_or("").trim(),
            "insurance_provider": request.insurance_provider.as_deref().unwrap_or("").trim(),
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        self.supabase
            .insert("patients", row, Some(auth_token))
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_role_profile(
        &self,
        user: &UserAccount,
        request: &UpdateUserRequest,
        auth_token: &str,
    ) -> Result<(), UserError> {
        let (table, patch) = match user.user_type {
            UserType::Admin => return Ok(()),
            UserType::Doctor => ("doctors", doctor_patch(request)),
            UserType::Receptionist => ("receptionists", receptionist_patch(request)),
            UserType::Patient => ("patients", patient_patch(request)),
        };

        if patch.is_empty() {
            return Ok(());
        }

        let mut patch = patch;
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // A missing profile row just matches zero rows; the soft behavior is
        // deliberate.
        self.supabase
            .update(
                table,
                &format!("user_id=eq.{}", user.id),
                Value::Object(patch),
                Some(auth_token),
            )
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(())
    }

    async fn ensure_clinic_exists(&self, clinic_id: Uuid, auth_token: &str) -> Result<(), UserError> {
        let rows: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?id=eq.{}&select=id", clinic_id),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(UserError::Validation("Clinic not found".to_string()));
        }
        Ok(())
    }

    async fn rollback_account(&self, user_id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Result<Value, _> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await;

        if let Err(e) = result {
            error!("Failed to roll back orphaned account {}: {}", user_id, e);
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), UserError> {
    let pattern = Regex::new(PHONE_PATTERN).expect("phone pattern is valid");
    if pattern.is_match(phone) {
        Ok(())
    } else {
        Err(UserError::Validation(
            "Phone number must be in the format '+999999999', up to 15 digits".to_string(),
        ))
    }
}

fn require_text<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, UserError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(UserError::Validation(message.to_string())),
    }
}

fn parse_shift(value: Option<&str>, default: NaiveTime) -> NaiveTime {
    value
        .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M").ok())
        .unwrap_or(default)
}

fn profile_code(prefix: &str) -> String {
    let tail = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}", prefix, tail)
}

fn default_weekdays() -> Vec<String> {
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn set_if(patch: &mut Map<String, Value>, field: &str, value: Option<&String>) {
    if let Some(v) = value {
        patch.insert(field.to_string(), json!(v));
    }
}

fn doctor_patch(request: &UpdateUserRequest) -> Map<String, Value> {
    let mut patch = Map::new();
    set_if(&mut patch, "specialization", request.specialization.as_ref());
    set_if(&mut patch, "license_number", request.license_number.as_ref());
    set_if(&mut patch, "education", request.education.as_ref());
    set_if(&mut patch, "certifications", request.certifications.as_ref());
    if let Some(years) = request.years_of_experience {
        patch.insert("years_of_experience".to_string(), json!(years));
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
    patch
}

fn receptionist_patch(request: &UpdateUserRequest) -> Map<String, Value> {
    let mut patch = Map::new();
    if let Some(start) = request.shift_start.as_deref() {
        if let Ok(time) = NaiveTime::parse_from_str(start, "%H:%M") {
            patch.insert(
                "shift_start".to_string(),
                json!(time.format("%H:%M:%S").to_string()),
            );
        }
    }
    if let Some(end) = request.shift_end.as_deref() {
        if let Ok(time) = NaiveTime::parse_from_str(end, "%H:%M") {
            patch.insert(
                "shift_end".to_string(),
                json!(time.format("%H:%M:%S").to_string()),
            );
        }
    }
    if let Some(days) = &request.working_days {
        patch.insert("working_days".to_string(), json!(days));
    }
    if let Some(permissions) = &request.permissions {
        patch.insert("permissions".to_string(), permissions.clone());
    }
    patch
}

fn patient_patch(request: &UpdateUserRequest) -> Map<String, Value> {
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
    patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation_accepts_international_format() {
        assert!(validate_phone("+21612345678").is_ok());
        assert!(validate_phone("123456789").is_ok());
        assert!(validate_phone("not-a-phone").is_err());
        assert!(validate_phone("+1234567890123456789").is_err());
    }

    #[test]
    fn shift_parse_falls_back_to_default() {
        let default = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(
            parse_shift(Some("09:30"), default),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(parse_shift(Some("garbage"), default), default);
        assert_eq!(parse_shift(None, default), default);
    }

    #[test]
    fn profile_codes_carry_role_prefix() {
        let code = profile_code("DOC");
        assert!(code.starts_with("DOC-"));
        assert_eq!(code.len(), 12);
    }
}
