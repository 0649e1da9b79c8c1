// libs/payment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use booking_cell::BookingService;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_access, require_staff};

use crate::error::PaymentError;
use crate::models::{CreateBookingRequest, ExpireResponse, GatewayCallback, GatewayFailureRequest, PaymentOutcome};
use crate::services::context::PaymentContext;

#[axum::debug_handler]
pub async fn create_booking(
    State(ctx): State<PaymentContext>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients always book for themselves; staff may book on a patient's behalf
    let owner = match request.user_id.clone() {
        Some(user_id) if user_id != user.id => {
            require_staff(&user)?;
            user_id
        }
        _ => user.id.clone(),
    };

    let created = ctx.gate.create_booking_with_payment(owner, request).await?;

    Ok(Json(json!({
        "success": true,
        "booking": created.booking,
        "payment": created.payment,
        "payment_intent": created.payment_intent,
        "message": "Booking reserved, awaiting payment"
    })))
}

/// Client-side confirmation after checkout. A failed verification is reported as an error
/// once the failure has been recorded.
#[axum::debug_handler]
pub async fn verify_payment(
    State(ctx): State<PaymentContext>,
    Extension(_user): Extension<User>,
    Json(callback): Json<GatewayCallback>,
) -> Result<Json<Value>, AppError> {
    let resolution = ctx.gate.verify_payment(callback).await?;

    if resolution.outcome == PaymentOutcome::Failed {
        let reason = resolution
            .payment
            .failure_reason
            .clone()
            .unwrap_or_else(|| "payment failed".to_string());
        return Err(PaymentError::VerificationFailed(reason).into());
    }

    Ok(Json(json!({
        "success": resolution.outcome == PaymentOutcome::Confirmed,
        "outcome": resolution.outcome,
        "booking": resolution.booking,
        "payment": resolution.payment
    })))
}

/// Gateway webhook. Authenticated by the callback signature, always acknowledged.
/// Callbacks that fail the signature check are acknowledged but never applied.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(ctx): State<PaymentContext>,
    Json(callback): Json<GatewayCallback>,
) -> Result<Json<Value>, AppError> {
    let Some(resolution) = ctx.gate.handle_webhook(callback).await? else {
        return Ok(Json(json!({
            "received": true,
            "outcome": "ignored"
        })));
    };

    if resolution.outcome == PaymentOutcome::Stale {
        warn!("Webhook for payment {} acknowledged as stale", resolution.payment.payment_id);
    }

    Ok(Json(json!({
        "received": true,
        "outcome": resolution.outcome
    })))
}

#[axum::debug_handler]
pub async fn dismiss_payment(
    State(ctx): State<PaymentContext>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&ctx.booking).get_booking(booking_id).await?;
    require_access(&user, &booking.booking.user_id)?;

    let resolution = ctx.gate.handle_user_dismissal(booking_id).await?;

    Ok(Json(json!({
        "outcome": resolution.outcome,
        "booking": resolution.booking,
        "payment": resolution.payment
    })))
}

#[axum::debug_handler]
pub async fn report_gateway_failure(
    State(ctx): State<PaymentContext>,
    Extension(user): Extension<User>,
    Json(request): Json<GatewayFailureRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = ctx.gate.booking_for_order(&request.order_id).await?;
    require_access(&user, &booking.booking.user_id)?;

    let resolution = ctx
        .gate
        .handle_gateway_failure(&request.order_id, &request.reason)
        .await?;

    Ok(Json(json!({
        "outcome": resolution.outcome,
        "booking": resolution.booking,
        "payment": resolution.payment
    })))
}

#[axum::debug_handler]
pub async fn expire_pending(
    State(ctx): State<PaymentContext>,
    Extension(user): Extension<User>,
) -> Result<Json<ExpireResponse>, AppError> {
    require_staff(&user)?;

    let expired = ctx.gate.expire_pending().await?;

    Ok(Json(ExpireResponse { expired }))
}
