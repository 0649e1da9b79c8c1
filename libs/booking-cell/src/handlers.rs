// libs/booking-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_access, require_staff};

use crate::models::{
    AddNextSessionRequest, AvailableDatesQuery, BookingStatus, RescheduleSessionRequest,
    SessionStatus, SlotsQuery, UpdateMainStatusRequest, UpdateSessionStatusRequest,
    UpsertCalendarRequest,
};
use crate::services::booking::BookingService;
use crate::services::context::BookingContext;

// ==============================================================================
// CALENDAR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_calendar(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
    Json(request): Json<UpsertCalendarRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = BookingService::new(&ctx);
    let calendar = service
        .upsert_calendar(clinic_id, request.into_calendar(clinic_id, ctx.clock.now()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "calendar": calendar,
        "message": "Clinic calendar saved"
    })))
}

#[axum::debug_handler]
pub async fn get_calendar(
    State(ctx): State<BookingContext>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let calendar = BookingService::new(&ctx).get_calendar(clinic_id).await?;

    Ok(Json(json!({ "calendar": calendar })))
}

#[axum::debug_handler]
pub async fn get_available_dates(
    State(ctx): State<BookingContext>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let dates = BookingService::new(&ctx)
        .get_available_dates(clinic_id, &query.month)
        .await?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "month": query.month,
        "dates": dates,
        "total": dates.len()
    })))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(ctx): State<BookingContext>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = BookingService::new(&ctx).get_slots(clinic_id, query.date).await?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "date": query.date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_next_available_date(
    State(ctx): State<BookingContext>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let date = BookingService::new(&ctx).next_available_date(clinic_id).await?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "next_available_date": date
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_booking(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&ctx).get_booking(booking_id).await?;
    require_access(&user, &booking.booking.user_id)?;

    Ok(Json(json!({ "booking": booking })))
}

#[axum::debug_handler]
pub async fn reschedule_session(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path((booking_id, session_number)): Path<(Uuid, u32)>,
    Json(request): Json<RescheduleSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&ctx);
    authorize_booking(&service, &user, booking_id).await?;

    let booking = service
        .reschedule_session(booking_id, session_number, request.new_date, request.new_time)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": format!("Session {} rescheduled", session_number)
    })))
}

/// Staff drive a session through its lifecycle. Patients may only cancel their own sessions.
#[axum::debug_handler]
pub async fn update_session_status(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path((booking_id, session_number)): Path<(Uuid, u32)>,
    Json(request): Json<UpdateSessionStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&ctx);
    authorize_booking(&service, &user, booking_id).await?;

    if request.status != SessionStatus::Cancelled {
        require_staff(&user)?;
    }

    let booking = service
        .update_session_status(booking_id, session_number, request.status, request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": format!("Session {} is now {}", session_number, request.status)
    })))
}

#[axum::debug_handler]
pub async fn add_next_session(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<AddNextSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&ctx);
    authorize_booking(&service, &user, booking_id).await?;

    let booking = service
        .add_next_session(booking_id, request.new_date, request.new_time)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Next session scheduled"
    })))
}

#[axum::debug_handler]
pub async fn update_main_status(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateMainStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&ctx);
    authorize_booking(&service, &user, booking_id).await?;

    if request.status != BookingStatus::Cancelled {
        require_staff(&user)?;
    }

    let booking = service
        .update_main_status(booking_id, request.status, request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": format!("Booking is now {}", booking.booking.session_status)
    })))
}

#[axum::debug_handler]
pub async fn list_user_bookings(
    State(ctx): State<BookingContext>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_access(&user, &user_id)?;

    let bookings = BookingService::new(&ctx).list_bookings(&user_id).await;

    Ok(Json(json!({
        "current": bookings.current,
        "history": bookings.history,
        "summary": bookings.summary
    })))
}

async fn authorize_booking(
    service: &BookingService,
    user: &User,
    booking_id: Uuid,
) -> Result<(), AppError> {
    let booking = service.get_booking(booking_id).await?;
    require_access(user, &booking.booking.user_id)
}
