// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scheduling_cell::{ClinicCalendar, DateAvailability, Slot, SlotResolver};
use shared_utils::clock::Clock;

use crate::error::BookingError;
use crate::models::{
    Booking, BookingClassification, BookingListResponse, BookingStatus, BookingSummary, BookingView,
    Payment, PaymentStatus, Session, SessionStatus,
};
use crate::services::aggregate::{current_booking_order, history_booking_order};
use crate::services::context::BookingContext;
use crate::services::events::{DomainEvent, EventPublisher};
use crate::services::lifecycle::SessionLifecycleService;
use crate::services::store::BookingStore;

pub struct BookingService {
    store: Arc<BookingStore>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
    lifecycle: SessionLifecycleService,
    resolver: SlotResolver,
}

impl BookingService {
    pub fn new(ctx: &BookingContext) -> Self {
        Self {
            store: Arc::clone(&ctx.store),
            events: ctx.events.clone(),
            clock: Arc::clone(&ctx.clock),
            lifecycle: SessionLifecycleService::new(),
            resolver: SlotResolver::new(),
        }
    }

    // ==============================================================================
    // CALENDAR AND AVAILABILITY
    // ==============================================================================

    #[instrument(skip(self, calendar))]
    pub async fn upsert_calendar(
        &self,
        clinic_id: Uuid,
        mut calendar: ClinicCalendar,
    ) -> Result<ClinicCalendar, BookingError> {
        debug!("Upserting calendar for clinic {}", clinic_id);

        calendar.clinic_id = clinic_id;
        calendar.updated_at = self.clock.now();

        let stored = calendar.clone();
        self.store
            .transaction(move |state| state.upsert_calendar(calendar))
            .await?;

        Ok(stored)
    }

    pub async fn get_calendar(&self, clinic_id: Uuid) -> Result<ClinicCalendar, BookingError> {
        self.store
            .read(|state| state.calendar(clinic_id).cloned())
            .await
    }

    /// Dates of `month` from today onwards that still have an available slot.
    #[instrument(skip(self))]
    pub async fn get_available_dates(
        &self,
        clinic_id: Uuid,
        month: &str,
    ) -> Result<Vec<DateAvailability>, BookingError> {
        debug!("Resolving available dates for clinic {} in {}", clinic_id, month);
        let today = self.clock.today();

        let dates = self
            .store
            .read(|state| {
                let calendar = state.calendar(clinic_id)?;
                let index = state.occupancy(clinic_id);
                self.resolver
                    .available_dates_in_month(calendar, &index, month)
                    .map_err(BookingError::from)
            })
            .await?;

        Ok(dates.into_iter().filter(|d| d.date >= today).collect())
    }

    pub async fn get_slots(&self, clinic_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, BookingError> {
        debug!("Resolving slots for clinic {} on {}", clinic_id, date);

        self.store
            .read(|state| {
                let calendar = state.calendar(clinic_id)?;
                let index = state.occupancy(clinic_id);
                Ok(self.resolver.resolve_indexed(calendar, date, &index))
            })
            .await
    }

    pub async fn next_available_date(&self, clinic_id: Uuid) -> Result<Option<NaiveDate>, BookingError> {
        let today = self.clock.today();

        self.store
            .read(|state| {
                let calendar = state.calendar(clinic_id)?;
                let index = state.occupancy(clinic_id);
                Ok(self.resolver.next_available_date(calendar, &index, today))
            })
            .await
    }

    // ==============================================================================
    // BOOKING OPERATIONS
    // ==============================================================================

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<BookingView, BookingError> {
        let today = self.clock.today();
        self.store
            .read(|state| state.booking(booking_id).map(|b| b.view(today)))
            .await
    }

    /// Move a session to another slot. The new slot is checked and taken in the same transaction.
    #[instrument(skip(self))]
    pub async fn reschedule_session(
        &self,
        booking_id: Uuid,
        session_number: u32,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<BookingView, BookingError> {
        debug!("Rescheduling session {} of booking {}", session_number, booking_id);
        let now = self.clock.now();
        let today = self.clock.today();
        let lifecycle = self.lifecycle;

        let (view, event) = self
            .store
            .transaction(|state| {
                let booking = state.booking(booking_id)?;
                booking.ensure_active("reschedule")?;
                let session = booking.session(session_number)?;
                lifecycle.ensure_reschedulable(session)?;
                state.check_reservation(booking.clinic_id, new_date, new_time, today, Some(session))?;

                let booking = state.booking_mut(booking_id)?;
                let change = lifecycle.reschedule(booking.session_mut(session_number)?, new_date, new_time, now)?;
                booking.updated_at = now;

                let event = DomainEvent::SessionRescheduled {
                    booking_id,
                    session_number,
                    change,
                };
                Ok::<_, BookingError>((booking.view(today), event))
            })
            .await?;

        self.events.publish(event);
        Ok(view)
    }

    /// Confirm, complete, cancel or mark a no-show on one session.
    #[instrument(skip(self, reason))]
    pub async fn update_session_status(
        &self,
        booking_id: Uuid,
        session_number: u32,
        status: SessionStatus,
        reason: Option<String>,
    ) -> Result<BookingView, BookingError> {
        debug!("Updating session {} of booking {} to {}", session_number, booking_id, status);
        let now = self.clock.now();
        let today = self.clock.today();
        let lifecycle = self.lifecycle;

        let (view, events) = self
            .store
            .transaction(|state| {
                let payment_id = state.booking(booking_id)?.payment_id;
                let (booking, payment) = state.booking_with_payment_mut(payment_id)?;

                if status == SessionStatus::Cancelled {
                    if booking.session_status.is_closed() {
                        return Err(BookingError::transition(booking.session_status, status));
                    }
                } else {
                    booking.ensure_active(&status.to_string())?;
                }

                let session = booking.session_mut(session_number)?;
                let previous = lifecycle.apply_status(session, status, reason.as_deref(), now)?;

                let mut events = vec![DomainEvent::SessionStatusChanged {
                    booking_id,
                    session_number,
                    from: previous,
                    to: status,
                }];
                if status == SessionStatus::Completed {
                    events.push(DomainEvent::SessionCompleted {
                        booking_id,
                        session_number,
                    });
                }

                booking.updated_at = now;
                booking.refresh_status(now);

                if booking.session_status == BookingStatus::Cancelled {
                    events.push(DomainEvent::BookingCancelled {
                        booking_id,
                        booking_number: booking.booking_number.clone(),
                        reason: booking.cancellation_reason.clone().unwrap_or_default(),
                    });
                    events.extend(void_pending_payment(booking, payment, now));
                }
                Ok((booking.view(today), events))
            })
            .await?;

        self.events.publish_all(events);
        Ok(view)
    }

    /// Schedule the next session once the latest one is completed.
    #[instrument(skip(self))]
    pub async fn add_next_session(
        &self,
        booking_id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<BookingView, BookingError> {
        debug!("Adding next session to booking {}", booking_id);
        let now = self.clock.now();
        let today = self.clock.today();

        self.store
            .transaction(|state| {
                let booking = state.booking(booking_id)?;
                booking.ensure_active("add_session")?;
                let session_number = booking.next_session_number()?;
                state.check_reservation(booking.clinic_id, new_date, new_time, today, None)?;

                let booking = state.booking_mut(booking_id)?;
                booking
                    .sessions
                    .push(Session::new(session_number, new_date, new_time, now));
                booking.updated_at = now;

                info!(
                    "Session {} added to booking {} at {} {}",
                    session_number, booking.booking_number, new_date, new_time
                );
                Ok(booking.view(today))
            })
            .await
    }

    /// Booking-level status changes. Cancellation needs a reason and releases every open session.
    #[instrument(skip(self, reason))]
    pub async fn update_main_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> Result<BookingView, BookingError> {
        debug!("Updating booking {} to {}", booking_id, status);
        let now = self.clock.now();
        let today = self.clock.today();

        let (view, events) = self
            .store
            .transaction(|state| {
                let payment_id = state.booking(booking_id)?.payment_id;
                let (booking, payment) = state.booking_with_payment_mut(payment_id)?;
                let payment_status = payment.status;

                let events = match status {
                    BookingStatus::Cancelled => {
                        booking.cancel(reason.as_deref(), now)?;
                        let mut events = vec![DomainEvent::BookingCancelled {
                            booking_id,
                            booking_number: booking.booking_number.clone(),
                            reason: booking.cancellation_reason.clone().unwrap_or_default(),
                        }];
                        events.extend(void_pending_payment(booking, payment, now));
                        events
                    }
                    BookingStatus::Confirmed => {
                        match booking.session_status {
                            BookingStatus::Confirmed => {}
                            BookingStatus::Pending if payment_status == PaymentStatus::Success => {
                                booking.session_status = BookingStatus::Confirmed;
                                booking.updated_at = now;
                            }
                            BookingStatus::Pending => {
                                return Err(BookingError::ValidationError(
                                    "Booking cannot be confirmed before its payment succeeds".to_string(),
                                ));
                            }
                            current => return Err(BookingError::transition(current, status)),
                        }
                        Vec::new()
                    }
                    BookingStatus::Completed => {
                        let progress = booking.progress(today);
                        if booking.session_status != BookingStatus::Confirmed
                            || progress.pending_count > 0
                            || progress.completed_count == 0
                        {
                            return Err(BookingError::transition(booking.session_status, status));
                        }
                        booking.session_status = BookingStatus::Completed;
                        booking.updated_at = now;
                        Vec::new()
                    }
                    BookingStatus::Pending | BookingStatus::Failed => {
                        warn!("Booking {} cannot be moved to {} directly", booking_id, status);
                        return Err(BookingError::transition(booking.session_status, status));
                    }
                };

                info!("Booking {} status is now {}", booking.booking_number, booking.session_status);
                Ok((booking.view(today), events))
            })
            .await?;

        self.events.publish_all(events);
        Ok(view)
    }

    /// The patient dashboard: current and history bookings plus totals.
    #[instrument(skip(self))]
    pub async fn list_bookings(&self, user_id: &str) -> BookingListResponse {
        debug!("Listing bookings for user {}", user_id);
        let today = self.clock.today();

        let (views, total_amount_paid) = self
            .store
            .read(|state| {
                let mut paid = 0;
                let views: Vec<BookingView> = state
                    .bookings_for_user(user_id)
                    .map(|booking| {
                        let settled = state
                            .payment(booking.payment_id)
                            .map(|p| p.status == PaymentStatus::Success)
                            .unwrap_or(false);
                        if settled {
                            paid += booking.total_amount;
                        }
                        booking.view(today)
                    })
                    .collect();
                (views, paid)
            })
            .await;

        let mut summary = BookingSummary {
            total_bookings: views.len() as u32,
            total_amount_paid,
            ..BookingSummary::default()
        };

        let (mut current, mut history): (Vec<BookingView>, Vec<BookingView>) = views
            .into_iter()
            .inspect(|view| {
                summary.total_sessions_purchased += view.booking.no_of_session_book;
                summary.completed_sessions += view.progress.completed_count;
                summary.pending_sessions += view.progress.pending_count;
            })
            .partition(|view| view.classification == BookingClassification::Current);

        current.sort_by(current_booking_order);
        history.sort_by(history_booking_order);

        summary.current_count = current.len() as u32;
        summary.history_count = history.len() as u32;

        BookingListResponse {
            current,
            history,
            summary,
        }
    }
}

/// An unpaid booking takes its payment down with it.
fn void_pending_payment(booking: &Booking, payment: &mut Payment, now: DateTime<Utc>) -> Option<DomainEvent> {
    if payment.status != PaymentStatus::Pending {
        return None;
    }

    let reason = "booking cancelled";
    payment.status = PaymentStatus::Failed;
    payment.failure_reason = Some(reason.to_string());
    payment.updated_at = now;

    warn!("Payment {} failed with cancelled booking {}", payment.payment_id, booking.booking_number);
    Some(DomainEvent::PaymentFailed {
        booking_id: booking.booking_id,
        payment_id: payment.payment_id,
        reason: reason.to_string(),
    })
}
