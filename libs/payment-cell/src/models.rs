// libs/payment-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booking_cell::{BookingView, Payment, PatientDetails};

// ==============================================================================
// GATEWAY WIRE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    pub amount: i64,
    pub currency: &'a str,
    pub receipt: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Callback/webhook payload delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCallback {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub status: String,
}

impl GatewayCallback {
    pub fn reports_success(&self) -> bool {
        matches!(
            self.status.trim().to_ascii_lowercase().as_str(),
            "success" | "captured" | "paid"
        )
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Staff may book on behalf of a patient; patients always book for themselves.
    pub user_id: Option<String>,
    pub patient_details: PatientDetails,
    pub treatment_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub no_of_session_book: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFailureRequest {
    pub order_id: String,
    pub reason: String,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// What the client needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    pub key_id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingResponse {
    pub booking: BookingView,
    pub payment: Payment,
    pub payment_intent: PaymentIntent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Confirmed,
    Failed,
    /// The payment had already settled the other way; nothing changed.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResolution {
    pub outcome: PaymentOutcome,
    pub booking: BookingView,
    pub payment: Payment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpireResponse {
    pub expired: usize,
}
