use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{ActorProfile, ProfileRef, UserError};

/// Resolves the caller's role profile once per request. Every role-scoped
/// query in the system derives its filters from the result.
pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Map the authenticated principal to its role profile. A role claim
    /// with no matching profile row resolves to `Unassigned` rather than
    /// erroring; callers then see empty result sets.
    pub async fn resolve(&self, user: &User, auth_token: &str) -> Result<ActorProfile, UserError> {
        let profile = match user.role.as_deref() {
            Some("admin") => ActorProfile::Admin,
            Some("doctor") => self
                .profile_ref("doctors", &user.id, auth_token)
                .await?
                .map(ActorProfile::Doctor)
                .unwrap_or(ActorProfile::Unassigned),
            Some("receptionist") => self
                .profile_ref("receptionists", &user.id, auth_token)
                .await?
                .map(ActorProfile::Receptionist)
                .unwrap_or(ActorProfile::Unassigned),
            Some("patient") => self
                .profile_ref("patients", &user.id, auth_token)
                .await?
                .map(ActorProfile::Patient)
                .unwrap_or(ActorProfile::Unassigned),
            _ => ActorProfile::Unassigned,
        };

        debug!("Resolved actor profile for user {}: {:?}", user.id, profile);
        Ok(profile)
    }

    async fn profile_ref(
        &self,
        table: &str,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<ProfileRef>, UserError> {
        let path = format!(
            "/rest/v1/{}?user_id=eq.{}&select=id,clinic_id&limit=1",
            table, user_id
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| UserError::Database(e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let id = parse_uuid(&row, "id")?;
        let clinic_id = parse_uuid(&row, "clinic_id")?;
        Ok(Some(ProfileRef { id, clinic_id }))
    }
}

fn parse_uuid(row: &Value, field: &str) -> Result<Uuid, UserError> {
    row[field]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| UserError::Database(format!("Malformed {} in profile row", field)))
}
