// libs/payment-cell/src/router.rs
use axum::{middleware, routing::post, Router};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::context::PaymentContext;

pub fn payment_routes(ctx: PaymentContext) -> Router {
    // The gateway signs its webhook, so it skips JWT auth
    let public_routes = Router::new()
        .route("/webhook", post(handlers::payment_webhook));

    let protected_routes = Router::new()
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{booking_id}/dismiss", post(handlers::dismiss_payment))
        .route("/verify", post(handlers::verify_payment))
        .route("/failures", post(handlers::report_gateway_failure))
        .route("/expire", post(handlers::expire_pending)) // Staff only
        .layer(middleware::from_fn_with_state(ctx.booking.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(ctx)
}
