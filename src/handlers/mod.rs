pub mod availability;
pub mod bookings;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(availability::get_availability))
        .route("/api/services", get(availability::list_services))
        .route(
            "/api/services/:name/masters",
            get(availability::get_service_masters),
        )
        .route(
            "/api/services/:name/slots",
            get(availability::get_service_slots),
        )
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/api/bookings/:id",
            put(bookings::reschedule_booking).delete(bookings::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
