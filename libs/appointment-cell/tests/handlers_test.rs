use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockRows, TestConfig, TestUser};

const DAY: &str = "2031-06-02";

fn app(config: &TestConfig) -> Router {
    appointment_routes(config.to_arc())
}

fn authed_request(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let config = TestConfig::default();
    let response = app(&config)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn slot_query_requires_doctor_and_date() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let response = app(&config)
        .oneshot(authed_request("GET", "/available-slots", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slot_query_with_unresolvable_doctor_returns_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let uri = format!("/available-slots?doctor_id={}&date={}", Uuid::new_v4(), DAY);
    let response = app(&config)
        .oneshot(authed_request("GET", &uri, &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["slots"], json!([]));
}

#[tokio::test]
async fn overlapping_create_returns_conflict_status() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_date": format!("{}T10:00:00Z", DAY), "duration": 30 }
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::receptionist("desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let body = json!({
        "patient": patient,
        "doctor": doctor,
        "clinic": clinic,
        "appointment_date": format!("{}T10:15:00Z", DAY),
        "duration": 30
    });

    let response = app(&config)
        .oneshot(authed_request("POST", "/", &token, Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn patient_cannot_confirm_an_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let patient_profile = Uuid::new_v4();
    let clinic = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": patient_profile, "clinic_id": clinic }
        ])))
        .mount(&server)
        .await;

    let uri = format!("/{}/confirm", Uuid::new_v4());
    let response = app(&config)
        .oneshot(authed_request("PATCH", &uri, &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patient_can_cancel_their_own_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let patient_profile = Uuid::new_v4();
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let appointment = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": patient_profile, "clinic_id": clinic }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment.to_string(),
                &patient_profile.to_string(),
                &doctor.to_string(),
                &clinic.to_string(),
                &format!("{}T10:00:00Z", DAY),
                30,
                "scheduled",
            )
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment.to_string(),
                &patient_profile.to_string(),
                &doctor.to_string(),
                &clinic.to_string(),
                &format!("{}T10:00:00Z", DAY),
                30,
                "cancelled",
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!("/{}/cancel", appointment);
    let response = app(&config)
        .oneshot(authed_request("PATCH", &uri, &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], json!("cancelled"));
}

#[tokio::test]
async fn patient_cannot_cancel_someone_elses_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_store(&server.uri());
    let user = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let patient_profile = Uuid::new_v4();
    let other_patient = Uuid::new_v4();
    let clinic = Uuid::new_v4();
    let appointment = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": patient_profile, "clinic_id": clinic }
        ])))
        .mount(&server)
        .await;
    // The appointment belongs to a different patient, so it is not even
    // visible to the caller.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::appointment(
                &appointment.to_string(),
                &other_patient.to_string(),
                &Uuid::new_v4().to_string(),
                &clinic.to_string(),
                &format!("{}T10:00:00Z", DAY),
                30,
                "scheduled",
            )
        ])))
        .mount(&server)
        .await;

    let uri = format!("/{}/cancel", appointment);
    let response = app(&config)
        .oneshot(authed_request("PATCH", &uri, &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
