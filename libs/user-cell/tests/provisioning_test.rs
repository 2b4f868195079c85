use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{MockRows, TestConfig, TestUser};
use user_cell::models::{ActorProfile, CreateUserRequest, UserError};
use user_cell::services::{profile::ProfileService, provisioning::ProvisioningService};

fn doctor_request(clinic: Option<Uuid>) -> CreateUserRequest {
    serde_json::from_value(json!({
        "username": "drwho",
        "email": "drwho@example.com",
        "first_name": "Jane",
        "last_name": "Doe",
        "user_type": "doctor",
        "phone_number": "+21612345678",
        "date_of_birth": "1985-05-05",
        "clinic": clinic,
        "specialization": "Cardiology",
        "license_number": "MD-42",
        "years_of_experience": 12,
        "education": "Medical University",
        "consultation_fee": 90.0
    }))
    .unwrap()
}

async fn mount_no_duplicates(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn profile_failure_rolls_the_account_back() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    mount_no_duplicates(&server).await;
    let mut account = MockRows::user(&user_id.to_string(), "doctor");
    account["username"] = json!("drwho");
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([account])))
        .expect(1)
        .mount(&server)
        .await;
    // The missing clinic fails the profile step; the orphaned account must
    // be deleted again.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProvisioningService::new(&config);

    let result = service.create_user(doctor_request(None), "token").await;
    assert_matches!(result, Err(UserError::Validation(_)));
}

#[tokio::test]
async fn unknown_clinic_also_rolls_back() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_no_duplicates(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201)
            .set_body_json(json!([MockRows::user(&user_id.to_string(), "doctor")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProvisioningService::new(&config);

    let result = service
        .create_user(doctor_request(Some(clinic_id)), "token")
        .await;
    assert_matches!(result, Err(UserError::Validation(_)));
}

#[tokio::test]
async fn doctor_provisioning_creates_account_and_profile() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_no_duplicates(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201)
            .set_body_json(json!([MockRows::user(&user_id.to_string(), "doctor")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([{ "id": clinic_id }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::doctor(&Uuid::new_v4().to_string(), &user_id.to_string(), &clinic_id.to_string())
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProvisioningService::new(&config);

    let account = service
        .create_user(doctor_request(Some(clinic_id)), "token")
        .await
        .unwrap();

    assert_eq!(account.id, user_id);
}

#[tokio::test]
async fn duplicate_username_is_rejected_before_any_write() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("username", "eq.drwho"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProvisioningService::new(&config);

    let result = service
        .create_user(doctor_request(Some(Uuid::new_v4())), "token")
        .await;
    assert_matches!(result, Err(UserError::DuplicateUsername));
}

#[tokio::test]
async fn invalid_phone_number_is_rejected() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProvisioningService::new(&config);

    let mut request = doctor_request(Some(Uuid::new_v4()));
    request.phone_number = Some("not-a-phone".to_string());

    let result = service.create_user(request, "token").await;
    assert_matches!(result, Err(UserError::Validation(_)));
}

// ==============================================================================
// ACTOR PROFILE RESOLUTION
// ==============================================================================

#[tokio::test]
async fn doctor_role_resolves_to_its_profile_row() {
    let server = MockServer::start().await;
    let test_user = TestUser::doctor("doc@example.com");
    let profile_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", test_user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": profile_id, "clinic_id": clinic_id }
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProfileService::new(&config);

    let profile = service.resolve(&test_user.to_user(), "token").await.unwrap();

    assert_matches!(profile, ActorProfile::Doctor(p) if p.id == profile_id && p.clinic_id == clinic_id);
}

#[tokio::test]
async fn missing_profile_row_resolves_to_unassigned() {
    let server = MockServer::start().await;
    let test_user = TestUser::patient("pat@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProfileService::new(&config);

    let profile = service.resolve(&test_user.to_user(), "token").await.unwrap();
    assert_matches!(profile, ActorProfile::Unassigned);
}

#[tokio::test]
async fn admin_role_needs_no_profile_row() {
    let server = MockServer::start().await;
    let test_user = TestUser::admin("root@example.com");

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = ProfileService::new(&config);

    let profile = service.resolve(&test_user.to_user(), "token").await.unwrap();
    assert_matches!(profile, ActorProfile::Admin);
}
