use std::sync::Arc;

use booking_cell::BookingContext;

use crate::services::gate::PaymentGate;
use crate::services::gateway::PaymentGateway;

#[derive(Clone)]
pub struct PaymentContext {
    pub booking: BookingContext,
    pub gate: Arc<PaymentGate>,
}

impl PaymentContext {
    pub fn new(booking: BookingContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        let gate = Arc::new(PaymentGate::new(&booking, gateway));
        Self { booking, gate }
    }
}
