use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use clinic_cell::router::{clinic_routes, service_routes};
use doctor_cell::router::doctor_routes;
use messaging_cell::router::{conversation_routes, message_routes};
use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use user_cell::router::{directory_routes, user_routes};

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "MedFlow clinic API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/clinic-users", directory_routes(state.clone()))
        .nest("/clinics", clinic_routes(state.clone()))
        .nest("/services", service_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/conversations", conversation_routes(state.clone()))
        .nest("/messages", message_routes(state))
}
