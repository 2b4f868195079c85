use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::services::availability::AvailabilityService;
use shared_utils::test_utils::{MockRows, TestConfig};

// A date far enough ahead that every slot of the day is in the future.
const DAY: &str = "2031-06-02";

fn future_date() -> NaiveDate {
    NaiveDate::parse_from_str(DAY, "%Y-%m-%d").unwrap()
}

async fn mount_doctor(server: &MockServer, doctor_id: &str, doctor: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor])))
        .mount(server)
        .await;
}

async fn mount_appointments(server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_day_without_bookings_offers_the_whole_grid() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    mount_doctor(
        &server,
        &doctor_id.to_string(),
        MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id),
    )
    .await;
    mount_appointments(&server, json!([])).await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    // 09:00 through 16:30 at a 30-minute cadence.
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0].time.to_rfc3339(), format!("{}T09:00:00+00:00", DAY));
    assert_eq!(
        slots.last().unwrap().time.to_rfc3339(),
        format!("{}T16:30:00+00:00", DAY)
    );
    assert!(slots.iter().all(|s| s.available));
}

#[tokio::test]
async fn booked_slot_is_omitted_and_neighbours_survive() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    mount_doctor(
        &server,
        &doctor_id.to_string(),
        MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id),
    )
    .await;
    // Existing scheduled appointment 10:00-10:30.
    mount_appointments(
        &server,
        json!([{ "appointment_date": format!("{}T10:00:00Z", DAY), "duration": 30 }]),
    )
    .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    let times: Vec<String> = slots
        .iter()
        .map(|s| s.time.format("%H:%M").to_string())
        .collect();

    assert_eq!(slots.len(), 15);
    assert!(!times.contains(&"10:00".to_string()));
    assert!(times.contains(&"09:00".to_string()));
    assert!(times.contains(&"09:30".to_string()));
    assert!(times.contains(&"10:30".to_string()));
    assert!(times.contains(&"11:00".to_string()));
    assert!(times.contains(&"16:30".to_string()));
}

#[tokio::test]
async fn service_duration_drives_the_fit_check() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    mount_doctor(
        &server,
        &doctor_id.to_string(),
        MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id),
    )
    .await;
    mount_appointments(&server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("id", format!("eq.{}", service_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockRows::service(&service_id.to_string(), &clinic_id, 45)])),
        )
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), Some(service_id), "token")
        .await
        .unwrap();

    // Cadence stays at 30 minutes; only the tail shrinks because a
    // 45-minute visit no longer fits after 16:00.
    assert_eq!(slots[0].time.format("%H:%M").to_string(), "09:00");
    assert_eq!(slots[1].time.format("%H:%M").to_string(), "09:30");
    assert_eq!(
        slots.last().unwrap().time.format("%H:%M").to_string(),
        "16:00"
    );
}

#[tokio::test]
async fn unknown_doctor_yields_empty_not_error() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn unavailable_doctor_yields_empty() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    let mut doctor = MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id);
    doctor["is_available"] = json!(false);
    mount_doctor(&server, &doctor_id.to_string(), doctor).await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn malformed_working_hours_fall_back_to_the_default_window() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    let mut doctor = MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id);
    doctor["available_hours"] = json!({"open": "late", "close": "later"});
    mount_doctor(&server, &doctor_id.to_string(), doctor).await;
    mount_appointments(&server, json!([])).await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    // Silently corrected to 09:00-17:00.
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0].time.format("%H:%M").to_string(), "09:00");
}

#[tokio::test]
async fn evening_hours_config_is_respected() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    let mut doctor = MockRows::doctor(&doctor_id.to_string(), &user_id, &clinic_id);
    doctor["available_hours"] = json!({"start": "21:00", "end": "23:00"});
    mount_doctor(&server, &doctor_id.to_string(), doctor).await;
    mount_appointments(&server, json!([])).await;

    let config = TestConfig::with_mock_store(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let slots = service
        .available_slots(doctor_id, future_date(), None, "token")
        .await
        .unwrap();

    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].time.format("%H:%M").to_string(), "21:00");
    assert_eq!(slots.last().unwrap().time.format("%H:%M").to_string(), "22:30");
}
