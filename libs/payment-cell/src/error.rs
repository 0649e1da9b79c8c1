use thiserror::Error;

use booking_cell::BookingError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Gateway(err.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        let message = error.to_string();
        match error {
            PaymentError::Booking(e) => e.into(),
            PaymentError::NotConfigured => AppError::Internal(message),
            PaymentError::Gateway(_) => AppError::ExternalService(message),
            PaymentError::VerificationFailed(_) => AppError::BadRequest(message),
        }
    }
}
