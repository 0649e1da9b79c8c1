// libs/booking-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::context::BookingContext;

pub fn booking_routes(ctx: BookingContext) -> Router {
    // Every booking route requires an authenticated user
    let protected_routes = Router::new()
        // Clinic calendars and availability
        .route("/calendars/{clinic_id}", put(handlers::upsert_calendar))
        .route("/calendars/{clinic_id}", get(handlers::get_calendar))
        .route("/clinics/{clinic_id}/available-dates", get(handlers::get_available_dates))
        .route("/clinics/{clinic_id}/slots", get(handlers::get_slots))
        .route("/clinics/{clinic_id}/next-available-date", get(handlers::get_next_available_date))

        // Booking and session lifecycle
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/status", patch(handlers::update_main_status))
        .route("/{booking_id}/sessions", post(handlers::add_next_session))
        .route("/{booking_id}/sessions/{session_number}/reschedule", patch(handlers::reschedule_session))
        .route("/{booking_id}/sessions/{session_number}/status", patch(handlers::update_session_status))

        // Patient dashboard
        .route("/users/{user_id}", get(handlers::list_user_bookings))

        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(ctx)
}
