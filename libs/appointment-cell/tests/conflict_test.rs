use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, CreateAppointmentRequest};
use appointment_cell::services::booking::BookingService;
use shared_utils::test_utils::{MockRows, TestConfig};

const DAY: &str = "2031-06-02";

fn create_request(
    doctor: Uuid,
    patient: Uuid,
    clinic: Uuid,
    time: &str,
    duration: Option<i32>,
) -> CreateAppointmentRequest {
    serde_json::from_value(json!({
        "patient": patient,
        "doctor": doctor,
        "clinic": clinic,
        "appointment_date": format!("{}T{}:00Z", DAY, time),
        "duration": duration
    }))
    .unwrap()
}

async fn mount_active_appointments(server: &MockServer, doctor: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn overlapping_booking_fails_and_never_writes() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // Existing scheduled appointment 10:00-10:30.
    mount_active_appointments(
        &server,
        doctor,
        json!([{ "appointment_date": format!("{}T10:00:00Z", DAY), "duration": 30 }]),
    )
    .await;
    // The write must never happen on a conflict.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    // [10:15, 10:45) overlaps [10:00, 10:30).
    let result = service
        .create(create_request(doctor, patient, clinic, "10:15", Some(30)), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::Conflict { .. }));
    let err = result.unwrap_err().to_string();
    assert!(err.contains("10:00"), "conflict message names the window: {}", err);
    assert!(err.contains("10:30"), "conflict message names the window: {}", err);
}

#[tokio::test]
async fn touching_intervals_do_not_conflict() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    mount_active_appointments(
        &server,
        doctor,
        json!([{ "appointment_date": format!("{}T10:00:00Z", DAY), "duration": 30 }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::appointment(
                &Uuid::new_v4().to_string(),
                &patient.to_string(),
                &doctor.to_string(),
                &clinic.to_string(),
                &format!("{}T10:30:00Z", DAY),
                30,
                "scheduled",
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    // Starts exactly when the existing one ends.
    let created = service
        .create(create_request(doctor, patient, clinic, "10:30", Some(30)), "token")
        .await
        .unwrap();

    assert_eq!(created.duration, 30);
}

#[tokio::test]
async fn service_duration_overrides_the_requested_one() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let service_id = Uuid::new_v4();

    mount_active_appointments(&server, doctor, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("id", format!("eq.{}", service_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::service(&service_id.to_string(), &clinic.to_string(), 45)
        ])))
        .mount(&server)
        .await;
    // The inserted row must carry the service's 45 minutes, not the
    // client-supplied 30.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "duration": 45 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::appointment(
                &Uuid::new_v4().to_string(),
                &patient.to_string(),
                &doctor.to_string(),
                &clinic.to_string(),
                &format!("{}T09:00:00Z", DAY),
                45,
                "scheduled",
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let mut request = create_request(doctor, patient, clinic, "09:00", Some(30));
    request.service = Some(service_id);

    let created = service.create(request, "token").await.unwrap();
    assert_eq!(created.duration, 45);
}

#[tokio::test]
async fn missing_duration_defaults_to_thirty() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    mount_active_appointments(&server, doctor, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "duration": 30 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::appointment(
                &Uuid::new_v4().to_string(),
                &patient.to_string(),
                &doctor.to_string(),
                &clinic.to_string(),
                &format!("{}T09:00:00Z", DAY),
                30,
                "scheduled",
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let created = service
        .create(create_request(doctor, patient, clinic, "09:00", None), "token")
        .await
        .unwrap();

    assert_eq!(created.duration, 30);
}

#[tokio::test]
async fn past_dated_booking_is_rejected_before_any_read() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let request: CreateAppointmentRequest = serde_json::from_value(json!({
        "patient": patient,
        "doctor": doctor,
        "clinic": clinic,
        "appointment_date": "2020-01-01T10:00:00Z",
        "duration": 30
    }))
    .unwrap();

    let result = service.create(request, "token").await;
    assert_matches!(result, Err(AppointmentError::PastDate));
}

#[tokio::test]
async fn non_positive_duration_is_a_validation_error() {
    let server = MockServer::start().await;
    let (doctor, patient, clinic) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .create(create_request(doctor, patient, clinic, "09:00", Some(0)), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}
