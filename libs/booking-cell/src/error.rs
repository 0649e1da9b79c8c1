use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use scheduling_cell::SchedulingError;
use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Slot {date} {time} is no longer available")]
    SlotUnavailable { date: NaiveDate, time: NaiveTime },

    #[error("{date} is outside the clinic booking window")]
    OutOfBookingWindow { date: NaiveDate },

    #[error("Session {session_number} is locked until the previous session is completed")]
    SequenceNotUnlocked { session_number: u32 },

    #[error("Session {session_number} must be completed before another session can be added")]
    PriorSessionIncomplete { session_number: u32 },

    #[error("All {limit} purchased sessions have already been scheduled")]
    SessionLimitReached { limit: u32 },

    #[error("A cancellation reason is required")]
    MissingCancellationReason,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("Session {session_number} not found on booking {booking_id}")]
    SessionNotFound { booking_id: Uuid, session_number: u32 },

    #[error("No calendar configured for clinic {0}")]
    CalendarNotFound(Uuid),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Invalid clinic calendar: {0}")]
    InvalidCalendar(String),

    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl BookingError {
    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        BookingError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<SchedulingError> for BookingError {
    fn from(error: SchedulingError) -> Self {
        match error {
            SchedulingError::OutOfBookingWindow { date } => BookingError::OutOfBookingWindow { date },
            SchedulingError::SlotUnavailable { date, time } => BookingError::SlotUnavailable { date, time },
            SchedulingError::InvalidCalendar(msg) => BookingError::InvalidCalendar(msg),
            SchedulingError::InvalidMonth(month) => BookingError::InvalidMonth(month),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let message = error.to_string();
        match error {
            BookingError::SlotUnavailable { .. }
            | BookingError::SequenceNotUnlocked { .. }
            | BookingError::PriorSessionIncomplete { .. }
            | BookingError::SessionLimitReached { .. } => AppError::Conflict(message),
            BookingError::OutOfBookingWindow { .. }
            | BookingError::MissingCancellationReason
            | BookingError::InvalidStateTransition { .. }
            | BookingError::InvalidMonth(_) => AppError::BadRequest(message),
            BookingError::InvalidCalendar(_) | BookingError::ValidationError(_) => {
                AppError::ValidationError(message)
            }
            BookingError::BookingNotFound(_)
            | BookingError::SessionNotFound { .. }
            | BookingError::CalendarNotFound(_)
            | BookingError::PaymentNotFound(_) => AppError::NotFound(message),
        }
    }
}
