// libs/payment-cell/src/services/gate.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use booking_cell::{
    Booking, BookingContext, BookingDraft, BookingStatus, BookingStore, BookingView, DomainEvent,
    EventPublisher, Payment, PaymentStatus, StoreState,
};
use shared_config::AppConfig;
use shared_utils::clock::Clock;

use crate::error::PaymentError;
use crate::models::{
    CreateBookingRequest, CreateBookingResponse, GatewayCallback, PaymentIntent, PaymentOutcome,
    PaymentResolution,
};
use crate::services::gateway::PaymentGateway;

/// Keeps a booking and its payment moving together: a booking is only confirmed by a verified
/// successful payment, and every failure path closes both.
pub struct PaymentGate {
    store: Arc<BookingStore>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
    config: Arc<AppConfig>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentGate {
    pub fn new(ctx: &BookingContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store: Arc::clone(&ctx.store),
            events: ctx.events.clone(),
            clock: Arc::clone(&ctx.clock),
            config: Arc::clone(&ctx.config),
            gateway,
        }
    }

    /// Open a gateway order, then reserve the slot and create booking, first session and payment at once.
    #[instrument(skip(self, request), fields(clinic_id = %request.clinic_id, date = %request.date))]
    pub async fn create_booking_with_payment(
        &self,
        user_id: String,
        request: CreateBookingRequest,
    ) -> Result<CreateBookingResponse, PaymentError> {
        debug!("Creating booking with payment for user {}", user_id);
        let today = self.clock.today();

        let draft = BookingDraft {
            user_id,
            patient_details: request.patient_details,
            treatment_id: request.treatment_id,
            clinic_id: request.clinic_id,
            doctor_id: request.doctor_id,
            no_of_session_book: request.no_of_session_book,
            date: request.date,
            time: request.time,
            total_amount: request.total_amount,
        };

        // Cheap early rejection; the reservation itself is re-checked atomically below
        draft.validate()?;
        self.store
            .read(|state| {
                state
                    .check_reservation(draft.clinic_id, draft.date, draft.time, today, None)
                    .map(|_| ())
            })
            .await?;

        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());
        let currency = self.config.payment_currency.clone();
        let order = self
            .gateway
            .create_order(draft.total_amount, &currency, &receipt)
            .await?;

        let now = self.clock.now();
        let order_id = order.order_id.clone();
        let (booking, payment) = self
            .store
            .transaction(|state| state.open_booking(draft, &order_id, &currency, now))
            .await
            .map_err(|e| {
                warn!("Gateway order {} left unused: {}", order_id, e);
                e
            })?;

        info!(
            "Booking {} created with payment {} awaiting gateway order {}",
            booking.booking_number, payment.payment_id, order.order_id
        );

        Ok(CreateBookingResponse {
            booking: booking.view(today),
            payment_intent: PaymentIntent {
                gateway_order_id: order.order_id,
                key_id: self.gateway.key_id(),
                amount: order.amount_minor,
                currency: order.currency,
                receipt,
            },
            payment,
        })
    }

    /// Apply a gateway callback. Repeats of a settled outcome are no-ops and contradicting
    /// late callbacks are absorbed as stale.
    #[instrument(skip(self, callback), fields(order_id = %callback.order_id))]
    pub async fn verify_payment(&self, callback: GatewayCallback) -> Result<PaymentResolution, PaymentError> {
        debug!("Verifying callback for order {} with status {}", callback.order_id, callback.status);

        let signature_valid = self
            .gateway
            .verify_signature(&callback.order_id, &callback.payment_id, &callback.signature);
        if !signature_valid {
            warn!("Invalid signature on callback for order {}", callback.order_id);
        }
        let succeeded = signature_valid && callback.reports_success();

        let now = self.clock.now();
        let today = self.clock.today();

        let (resolution, events) = self
            .store
            .transaction(|state| {
                let payment_id = state.payment_id_for_order(&callback.order_id)?;
                let (booking, payment) = state.booking_with_payment_mut(payment_id)?;

                if payment.status.is_terminal() {
                    let repeat = match payment.status {
                        PaymentStatus::Success => {
                            succeeded && payment.gateway_payment_id.as_deref() == Some(callback.payment_id.as_str())
                        }
                        PaymentStatus::Failed => !succeeded,
                        PaymentStatus::Pending => false,
                    };

                    let outcome = if repeat {
                        debug!("Repeated callback for payment {}", payment.payment_id);
                        settled_outcome(payment.status)
                    } else {
                        payment.stale_callbacks += 1;
                        warn!(
                            "Stale callback for payment {} already {:?}: gateway reports '{}'",
                            payment.payment_id, payment.status, callback.status
                        );
                        PaymentOutcome::Stale
                    };
                    return Ok((resolve(outcome, booking, payment, today), Vec::new()));
                }

                if !callback.payment_id.trim().is_empty() {
                    payment.gateway_payment_id = Some(callback.payment_id.clone());
                }

                if succeeded {
                    confirm_pair(booking, payment, now);
                    let event = DomainEvent::BookingConfirmed {
                        booking_id: booking.booking_id,
                        booking_number: booking.booking_number.clone(),
                        payment_id: payment.payment_id,
                    };
                    return Ok((resolve(PaymentOutcome::Confirmed, booking, payment, today), vec![event]));
                }

                let reason = if signature_valid {
                    format!("gateway reported status '{}'", callback.status)
                } else {
                    "invalid payment signature".to_string()
                };
                let event = fail_pair(booking, payment, &reason, now);
                Ok::<_, PaymentError>((resolve(PaymentOutcome::Failed, booking, payment, today), vec![event]))
            })
            .await?;

        self.events.publish_all(events);
        Ok(resolution)
    }

    /// Gateway webhook delivery. The route is unauthenticated, so a callback whose signature does
    /// not verify is dropped without touching the payment.
    #[instrument(skip(self, callback), fields(order_id = %callback.order_id))]
    pub async fn handle_webhook(&self, callback: GatewayCallback) -> Result<Option<PaymentResolution>, PaymentError> {
        let authentic = self
            .gateway
            .verify_signature(&callback.order_id, &callback.payment_id, &callback.signature);
        if !authentic {
            warn!("Dropping unsigned webhook for order {}", callback.order_id);
            return Ok(None);
        }

        self.verify_payment(callback).await.map(Some)
    }

    /// The patient closed the checkout without paying.
    #[instrument(skip(self))]
    pub async fn handle_user_dismissal(&self, booking_id: Uuid) -> Result<PaymentResolution, PaymentError> {
        debug!("Handling payment dismissal for booking {}", booking_id);
        let now = self.clock.now();
        let today = self.clock.today();

        let (resolution, event) = self
            .store
            .transaction(|state| {
                let payment_id = state.booking(booking_id)?.payment_id;
                settle_failure(state, payment_id, "payment dismissed by user", false, now, today)
            })
            .await?;

        self.events.publish_all(event);
        Ok(resolution)
    }

    /// The gateway reported a failed attempt for an order.
    #[instrument(skip(self, reason))]
    pub async fn handle_gateway_failure(
        &self,
        order_id: &str,
        reason: &str,
    ) -> Result<PaymentResolution, PaymentError> {
        debug!("Handling gateway failure for order {}", order_id);
        let now = self.clock.now();
        let today = self.clock.today();
        let reason = match reason.trim() {
            "" => "gateway reported failure",
            given => given,
        };

        let (resolution, event) = self
            .store
            .transaction(|state| {
                let payment_id = state.payment_id_for_order(order_id)?;
                settle_failure(state, payment_id, reason, true, now, today)
            })
            .await?;

        self.events.publish_all(event);
        Ok(resolution)
    }

    /// Fail every payment still pending after the configured timeout, with its booking.
    #[instrument(skip(self))]
    pub async fn expire_pending(&self) -> Result<usize, PaymentError> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.payment_timeout_minutes);
        debug!("Expiring payments pending since before {}", cutoff);

        let events = self
            .store
            .transaction(|state| {
                let mut events = Vec::new();
                for payment_id in state.pending_payments_created_before(cutoff) {
                    let (booking, payment) = state.booking_with_payment_mut(payment_id)?;
                    events.push(fail_pair(booking, payment, "payment window expired", now));
                }
                Ok::<_, PaymentError>(events)
            })
            .await?;

        let expired = events.len();
        if expired > 0 {
            info!("Expired {} pending payments", expired);
        }
        self.events.publish_all(events);
        Ok(expired)
    }

    pub async fn booking_for_order(&self, order_id: &str) -> Result<BookingView, PaymentError> {
        let today = self.clock.today();
        let view = self
            .store
            .read(|state| {
                let payment_id = state.payment_id_for_order(order_id)?;
                let booking_id = state.payment(payment_id)?.booking_id;
                state.booking(booking_id).map(|b| b.view(today))
            })
            .await?;
        Ok(view)
    }
}

fn settled_outcome(status: PaymentStatus) -> PaymentOutcome {
    match status {
        PaymentStatus::Success => PaymentOutcome::Confirmed,
        PaymentStatus::Failed | PaymentStatus::Pending => PaymentOutcome::Failed,
    }
}

fn resolve(outcome: PaymentOutcome, booking: &Booking, payment: &Payment, today: NaiveDate) -> PaymentResolution {
    PaymentResolution {
        outcome,
        booking: booking.view(today),
        payment: payment.clone(),
    }
}

fn confirm_pair(booking: &mut Booking, payment: &mut Payment, now: DateTime<Utc>) {
    payment.status = PaymentStatus::Success;
    payment.paid_at = Some(now);
    payment.updated_at = now;

    booking.session_status = BookingStatus::Confirmed;
    booking.updated_at = now;

    info!("Payment {} succeeded, booking {} confirmed", payment.payment_id, booking.booking_number);
}

fn fail_pair(booking: &mut Booking, payment: &mut Payment, reason: &str, now: DateTime<Utc>) -> DomainEvent {
    payment.status = PaymentStatus::Failed;
    payment.failure_reason = Some(reason.to_string());
    payment.updated_at = now;

    booking.fail(reason, now);

    warn!("Payment {} failed ({}), booking {} closed", payment.payment_id, reason, booking.booking_number);
    DomainEvent::PaymentFailed {
        booking_id: booking.booking_id,
        payment_id: payment.payment_id,
        reason: reason.to_string(),
    }
}

/// Fail a pending payment. Already failed payments are left alone; a payment that succeeded
/// is never touched by a late failure signal.
fn settle_failure(
    state: &mut StoreState,
    payment_id: Uuid,
    reason: &str,
    from_gateway: bool,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<(PaymentResolution, Option<DomainEvent>), PaymentError> {
    let (booking, payment) = state.booking_with_payment_mut(payment_id)?;

    match payment.status {
        PaymentStatus::Pending => {
            let event = fail_pair(booking, payment, reason, now);
            Ok((resolve(PaymentOutcome::Failed, booking, payment, today), Some(event)))
        }
        PaymentStatus::Failed => {
            debug!("Payment {} already failed", payment.payment_id);
            Ok((resolve(PaymentOutcome::Failed, booking, payment, today), None))
        }
        PaymentStatus::Success => {
            if from_gateway {
                payment.stale_callbacks += 1;
            }
            warn!(
                "Ignoring failure signal for settled payment {}: {}",
                payment.payment_id, reason
            );
            Ok((resolve(PaymentOutcome::Stale, booking, payment, today), None))
        }
    }
}
