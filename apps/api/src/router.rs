use axum::{
    Router,
    routing::get,
};

use booking_cell::{booking_routes, BookingContext};
use payment_cell::{payment_routes, PaymentContext};

pub fn create_router(booking_ctx: BookingContext, payment_ctx: PaymentContext) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Booking API is running!" }))
        .nest("/bookings", booking_routes(booking_ctx))
        .nest("/payments", payment_routes(payment_ctx))
}
