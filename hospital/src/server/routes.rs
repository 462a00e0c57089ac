//! Router configuration for the hospital backend.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{admissions, appointments, rooms};
use crate::store::HospitalStore;
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use medbay_web::correlation_id_layer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Sibling routes share parameter names (`:id`) as the path matcher
/// requires; the handlers document what the id refers to.
///
/// - `/health`, `/ready`: liveness and readiness (no authentication)
/// - `/room/*`: room management
/// - `/admission/*`: admissions, fees, discharge
/// - `/appointment/*`: slots and appointments
pub fn build_router<D: HospitalStore>(state: AppState<D>) -> Router {
    let room_routes = Router::new()
        .route("/", get(rooms::list_rooms::<D>))
        .route("/add", post(rooms::add_room::<D>))
        .route("/update/:room_id", put(rooms::update_room::<D>))
        .route("/available", get(rooms::available_rooms::<D>))
        .route("/room-delete/:room_id", delete(rooms::delete_room::<D>));

    let admission_routes = Router::new()
        .route("/admit", post(admissions::admit::<D>))
        .route("/fees/:admission_id", put(admissions::update_fees::<D>))
        .route("/discharge/:admission_id", put(admissions::discharge::<D>))
        .route("/admitted-patients", get(admissions::admitted_patients::<D>));

    let appointment_routes = Router::new()
        // Slots
        .route("/slots", post(appointments::add_slot::<D>))
        .route("/slots/recurring", post(appointments::add_recurring_slots::<D>))
        .route("/slots/:id/:day", get(appointments::available_slots::<D>))
        .route("/slots/:id", delete(appointments::delete_slot::<D>))
        .route("/upcomingslots/:hcp_id", get(appointments::upcoming_slots::<D>))
        // Appointments
        .route("/book", post(appointments::book::<D>))
        .route(
            "/appointments/:id/status",
            patch(appointments::update_status::<D>),
        )
        .route(
            "/appointments/patient/:patient_id",
            get(appointments::patient_appointments::<D>),
        )
        .route("/appointments/:id", get(appointments::doctor_appointments::<D>))
        .route(
            "/appointment/:appointment_id",
            get(appointments::get_appointment::<D>),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<D>))
        .nest("/room", room_routes)
        .nest("/admission", admission_routes)
        .nest("/appointment", appointment_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
