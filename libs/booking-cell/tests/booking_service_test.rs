use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use booking_cell::*;
use scheduling_cell::{BookingWindow, ClinicCalendar, WorkingHours};
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::TestConfig;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn calendar(clinic_id: Uuid, capacity: u32) -> ClinicCalendar {
    ClinicCalendar {
        clinic_id,
        booking_window: BookingWindow {
            start_date: date(1),
            end_date: date(30),
        },
        working_hours: WorkingHours {
            open: time(10, 0),
            close: time(11, 0),
        },
        slot_duration_minutes: 30,
        off_day: None,
        capacity_per_slot: capacity,
        updated_at: Utc::now(),
    }
}

fn draft(clinic_id: Uuid, user_id: &str, sessions: u32, day: u32, slot: NaiveTime) -> BookingDraft {
    BookingDraft {
        user_id: user_id.to_string(),
        patient_details: PatientDetails {
            name: "Asha Rao".to_string(),
            phone: "+919800000000".to_string(),
            email: Some("asha@example.com".to_string()),
        },
        treatment_id: Uuid::new_v4(),
        clinic_id,
        doctor_id: None,
        no_of_session_book: sessions,
        date: date(day),
        time: slot,
        total_amount: 150_000,
    }
}

struct Harness {
    ctx: BookingContext,
    clock: Arc<FixedClock>,
    service: BookingService,
    clinic_id: Uuid,
}

async fn harness(capacity: u32) -> Harness {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 5, 8, 0, 0).unwrap()));
    let ctx = BookingContext::with_clock(TestConfig::default().to_arc(), clock.clone());
    let service = BookingService::new(&ctx);
    let clinic_id = Uuid::new_v4();

    service
        .upsert_calendar(clinic_id, calendar(clinic_id, capacity))
        .await
        .unwrap();

    Harness {
        ctx,
        clock,
        service,
        clinic_id,
    }
}

impl Harness {
    async fn open(&self, draft: BookingDraft) -> Result<(Booking, Payment), BookingError> {
        let now = self.clock_now();
        let order_id = format!("order_{}", Uuid::new_v4().simple());
        self.ctx
            .store
            .transaction(move |state| state.open_booking(draft, &order_id, "INR", now))
            .await
    }

    /// Settle the payment the way a verified gateway callback does.
    async fn settle(&self, payment_id: Uuid) {
        let now = self.clock_now();
        self.ctx
            .store
            .transaction(|state| {
                let (booking, payment) = state.booking_with_payment_mut(payment_id)?;
                payment.status = PaymentStatus::Success;
                payment.paid_at = Some(now);
                booking.session_status = BookingStatus::Confirmed;
                Ok::<_, BookingError>(())
            })
            .await
            .unwrap();
    }

    async fn confirmed_booking(&self, sessions: u32, day: u32) -> Booking {
        let (booking, payment) = self
            .open(draft(self.clinic_id, "patient-1", sessions, day, time(10, 0)))
            .await
            .unwrap();
        self.settle(payment.payment_id).await;
        booking
    }

    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use shared_utils::clock::Clock;
        self.clock.now()
    }
}

// ==============================================================================
// RESERVATION
// ==============================================================================

#[tokio::test]
async fn test_same_slot_is_rejected_and_neighbour_slot_accepted() {
    let h = harness(1).await;

    h.open(draft(h.clinic_id, "patient-a", 1, 10, time(10, 0))).await.unwrap();

    let second = h.open(draft(h.clinic_id, "patient-b", 1, 10, time(10, 0))).await;
    assert_matches!(second, Err(BookingError::SlotUnavailable { .. }));

    let neighbour = h.open(draft(h.clinic_id, "patient-b", 1, 10, time(10, 30))).await;
    assert!(neighbour.is_ok());
}

#[tokio::test]
async fn test_booking_number_and_first_session() {
    let h = harness(2).await;

    let (booking, payment) = h.open(draft(h.clinic_id, "patient-a", 3, 10, time(10, 0))).await.unwrap();

    assert_eq!(booking.booking_number, "BK-20240605-0001");
    assert_eq!(booking.session_status, BookingStatus::Pending);
    assert_eq!(booking.sessions.len(), 1);
    assert_eq!(booking.sessions[0].session_number, 1);
    assert_eq!(booking.sessions[0].status, SessionStatus::Pending);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.booking_id, booking.booking_id);
    assert_eq!(booking.payment_id, payment.payment_id);
}

#[tokio::test]
async fn test_reservations_outside_window_or_in_past_are_rejected() {
    let h = harness(1).await;

    let past = h.open(draft(h.clinic_id, "patient-a", 1, 4, time(10, 0))).await;
    assert_matches!(past, Err(BookingError::OutOfBookingWindow { .. }));

    let mut late = draft(h.clinic_id, "patient-a", 1, 30, time(10, 0));
    late.date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    assert_matches!(h.open(late).await, Err(BookingError::OutOfBookingWindow { .. }));

    let off_grid = h.open(draft(h.clinic_id, "patient-a", 1, 10, time(10, 15))).await;
    assert_matches!(off_grid, Err(BookingError::SlotUnavailable { .. }));
}

#[tokio::test]
async fn test_rejected_draft_leaves_store_untouched() {
    let h = harness(1).await;

    let mut invalid = draft(h.clinic_id, "patient-a", 0, 10, time(10, 0));
    assert_matches!(h.open(invalid.clone()).await, Err(BookingError::ValidationError(_)));

    invalid.no_of_session_book = 1;
    assert!(h.open(invalid).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_never_overbook() {
    let capacity = 3;
    let h = harness(capacity).await;
    let now = h.clock_now();

    let attempts = (0..=capacity).map(|i| {
        let store = Arc::clone(&h.ctx.store);
        let request = draft(h.clinic_id, &format!("patient-{}", i), 1, 12, time(10, 0));
        tokio::spawn(async move {
            let order_id = format!("order_{}", i);
            store
                .transaction(move |state| state.open_booking(request, &order_id, "INR", now))
                .await
        })
    });

    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(succeeded, capacity as usize);
    assert_eq!(rejected.len(), 1);
    assert_matches!(rejected[0], BookingError::SlotUnavailable { .. });

    let slots = h.service.get_slots(h.clinic_id, date(12)).await.unwrap();
    assert_eq!(slots[0].booked_count, capacity);
    assert!(!slots[0].is_available());
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn test_available_dates_skip_past_days_and_full_dates() {
    let h = harness(1).await;
    h.open(draft(h.clinic_id, "patient-a", 1, 6, time(10, 0))).await.unwrap();
    h.open(draft(h.clinic_id, "patient-b", 1, 6, time(10, 30))).await.unwrap();

    let dates = h.service.get_available_dates(h.clinic_id, "2024-06").await.unwrap();

    // 5th through 30th, minus the fully booked 6th
    assert_eq!(dates.len(), 25);
    assert_eq!(dates[0].date, date(5));
    assert!(dates.iter().all(|d| d.date != date(6)));

    assert_matches!(
        h.service.get_available_dates(h.clinic_id, "June").await,
        Err(BookingError::InvalidMonth(_))
    );
}

#[tokio::test]
async fn test_next_available_date_prefers_today() {
    let h = harness(1).await;
    assert_eq!(h.service.next_available_date(h.clinic_id).await.unwrap(), Some(date(5)));

    h.open(draft(h.clinic_id, "patient-a", 1, 5, time(10, 0))).await.unwrap();
    h.open(draft(h.clinic_id, "patient-b", 1, 5, time(10, 30))).await.unwrap();
    assert_eq!(h.service.next_available_date(h.clinic_id).await.unwrap(), Some(date(6)));
}

#[tokio::test]
async fn test_unknown_calendar_and_invalid_calendar() {
    let h = harness(1).await;

    assert_matches!(
        h.service.get_slots(Uuid::new_v4(), date(10)).await,
        Err(BookingError::CalendarNotFound(_))
    );

    let broken = calendar(h.clinic_id, 0);
    assert_matches!(
        h.service.upsert_calendar(h.clinic_id, broken).await,
        Err(BookingError::InvalidCalendar(_))
    );
}

// ==============================================================================
// SESSION LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn test_add_next_session_requires_completed_prior_session() {
    let h = harness(2).await;
    let booking = h.confirmed_booking(3, 10).await;

    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();

    let view = h.service
        .add_next_session(booking.booking_id, date(17), time(10, 0))
        .await
        .unwrap();
    assert_eq!(view.booking.sessions.len(), 2);
    assert_eq!(view.booking.sessions[1].session_number, 2);
    assert_eq!(view.progress.progress_percentage, 33);

    let again = h.service
        .add_next_session(booking.booking_id, date(24), time(10, 0))
        .await;
    assert_matches!(again, Err(BookingError::PriorSessionIncomplete { session_number: 2 }));
}

#[tokio::test]
async fn test_session_limit_and_auto_completion() {
    let h = harness(2).await;
    let booking = h.confirmed_booking(2, 10).await;

    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();
    h.service
        .add_next_session(booking.booking_id, date(11), time(10, 30))
        .await
        .unwrap();
    let view = h.service
        .update_session_status(booking.booking_id, 2, SessionStatus::Completed, None)
        .await
        .unwrap();

    assert_eq!(view.booking.session_status, BookingStatus::Completed);
    assert_eq!(view.progress.progress_percentage, 100);
    assert_eq!(view.classification, BookingClassification::History);

    let extra = h.service
        .add_next_session(booking.booking_id, date(12), time(10, 0))
        .await;
    assert_matches!(extra, Err(BookingError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_locked_session_number_reports_sequence_error() {
    let h = harness(2).await;
    let booking = h.confirmed_booking(3, 10).await;

    let locked = h.service
        .update_session_status(booking.booking_id, 2, SessionStatus::Completed, None)
        .await;
    assert_matches!(locked, Err(BookingError::SequenceNotUnlocked { session_number: 2 }));

    let missing = h.service
        .update_session_status(booking.booking_id, 7, SessionStatus::Completed, None)
        .await;
    assert_matches!(missing, Err(BookingError::SessionNotFound { .. }));
}

#[tokio::test]
async fn test_session_progress_requires_paid_booking() {
    let h = harness(1).await;
    let (booking, _) = h.open(draft(h.clinic_id, "patient-a", 1, 10, time(10, 0))).await.unwrap();

    let result = h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await;
    assert_matches!(result, Err(BookingError::InvalidStateTransition { .. }));

    // Cancelling a single session is still allowed before payment
    let view = h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Cancelled, Some("clash".to_string()))
        .await
        .unwrap();
    assert_eq!(view.booking.sessions[0].status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_completing_cancelled_session_is_invalid_transition() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(2, 10).await;

    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Cancelled, None)
        .await
        .unwrap();

    let result = h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await;
    assert_matches!(result, Err(BookingError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_cancelling_last_open_session_closes_unpaid_booking() {
    let h = harness(1).await;
    let (booking, payment) = h.open(draft(h.clinic_id, "patient-a", 3, 10, time(10, 0))).await.unwrap();
    let mut events = h.ctx.events.subscribe();

    let view = h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Cancelled, Some("clash".to_string()))
        .await
        .unwrap();

    assert_eq!(view.booking.session_status, BookingStatus::Cancelled);
    assert_eq!(view.booking.cancellation_reason.as_deref(), Some("clash"));
    assert_eq!(view.classification, BookingClassification::History);

    assert_matches!(events.recv().await.unwrap(), DomainEvent::SessionStatusChanged { .. });
    assert_matches!(
        events.recv().await.unwrap(),
        DomainEvent::BookingCancelled { reason, .. } if reason == "clash"
    );
    assert_matches!(
        events.recv().await.unwrap(),
        DomainEvent::PaymentFailed { payment_id, .. } if payment_id == payment.payment_id
    );

    let stored = h.ctx.store.read(|state| state.payment(payment.payment_id).cloned()).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert_eq!(stored.failure_reason.as_deref(), Some("booking cancelled"));
}

#[tokio::test]
async fn test_no_show_after_completed_sessions_closes_paid_booking() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(3, 10).await;
    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();
    h.service
        .add_next_session(booking.booking_id, date(12), time(10, 0))
        .await
        .unwrap();

    let view = h.service
        .update_session_status(booking.booking_id, 2, SessionStatus::NoShow, None)
        .await
        .unwrap();

    assert_eq!(view.booking.session_status, BookingStatus::Cancelled);
    assert_eq!(view.booking.cancellation_reason.as_deref(), Some("no session left to attend"));
    assert_eq!(view.progress.completed_count, 1);

    // The paid payment is left alone
    let payment = h.ctx.store.read(|state| state.payment(booking.payment_id).cloned()).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_reschedule_appends_history_and_frees_old_slot() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(1, 10).await;

    let view = h.service
        .reschedule_session(booking.booking_id, 1, date(11), time(10, 30))
        .await
        .unwrap();
    let session = &view.booking.sessions[0];
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.reschedule_history.len(), 1);
    assert_eq!(session.reschedule_history[0].old_date, date(10));
    assert!(session.is_consistent());

    let view = h.service
        .reschedule_session(booking.booking_id, 1, date(12), time(10, 0))
        .await
        .unwrap();
    let history = &view.booking.sessions[0].reschedule_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].new_date, date(11));
    assert_eq!(history[1].old_date, date(11));

    // The original slot was released, so another patient can take it
    assert!(h.open(draft(h.clinic_id, "patient-b", 1, 10, time(10, 0))).await.is_ok());
}

#[tokio::test]
async fn test_reschedule_to_full_slot_changes_nothing() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(1, 10).await;
    h.open(draft(h.clinic_id, "patient-b", 1, 11, time(10, 0))).await.unwrap();

    let result = h.service
        .reschedule_session(booking.booking_id, 1, date(11), time(10, 0))
        .await;
    assert_matches!(result, Err(BookingError::SlotUnavailable { .. }));

    let view = h.service.get_booking(booking.booking_id).await.unwrap();
    assert_eq!(view.booking.sessions[0].date, date(10));
    assert!(view.booking.sessions[0].reschedule_history.is_empty());
}

#[tokio::test]
async fn test_reschedule_to_current_slot_is_rejected() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(1, 10).await;

    let same = h.service
        .reschedule_session(booking.booking_id, 1, date(10), time(10, 0))
        .await;
    assert_matches!(same, Err(BookingError::ValidationError(_)));
}

// ==============================================================================
// MAIN STATUS AND DASHBOARD
// ==============================================================================

#[tokio::test]
async fn test_cancellation_requires_reason_then_moves_to_history() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(1, 15).await;
    let mut events = h.ctx.events.subscribe();

    let missing = h.service
        .update_main_status(booking.booking_id, BookingStatus::Cancelled, None)
        .await;
    assert_matches!(missing, Err(BookingError::MissingCancellationReason));

    let blank = h.service
        .update_main_status(booking.booking_id, BookingStatus::Cancelled, Some("  ".to_string()))
        .await;
    assert_matches!(blank, Err(BookingError::MissingCancellationReason));

    let view = h.service
        .update_main_status(
            booking.booking_id,
            BookingStatus::Cancelled,
            Some("patient request".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(view.booking.session_status, BookingStatus::Cancelled);
    assert_eq!(view.booking.cancellation_reason.as_deref(), Some("patient request"));
    assert_eq!(view.classification, BookingClassification::History);
    assert_eq!(view.booking.sessions[0].status, SessionStatus::Cancelled);

    assert_matches!(
        events.recv().await.unwrap(),
        DomainEvent::BookingCancelled { reason, .. } if reason == "patient request"
    );

    // The cascade released the slot
    assert!(h.open(draft(h.clinic_id, "patient-b", 1, 15, time(10, 0))).await.is_ok());
}

#[tokio::test]
async fn test_confirmation_requires_successful_payment() {
    let h = harness(1).await;
    let (booking, _) = h.open(draft(h.clinic_id, "patient-a", 1, 10, time(10, 0))).await.unwrap();

    let result = h.service
        .update_main_status(booking.booking_id, BookingStatus::Confirmed, None)
        .await;
    assert_matches!(result, Err(BookingError::ValidationError(_)));

    let failed = h.service
        .update_main_status(booking.booking_id, BookingStatus::Failed, None)
        .await;
    assert_matches!(failed, Err(BookingError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_manual_completion_needs_a_completed_session() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(3, 10).await;

    let open = h.service
        .update_main_status(booking.booking_id, BookingStatus::Completed, None)
        .await;
    assert_matches!(open, Err(BookingError::InvalidStateTransition { .. }));

    // Nothing open and nothing completed
    h.ctx
        .store
        .transaction(|state| {
            state.booking_mut(booking.booking_id)?.sessions[0].status = SessionStatus::Cancelled;
            Ok::<_, BookingError>(())
        })
        .await
        .unwrap();
    let empty = h.service
        .update_main_status(booking.booking_id, BookingStatus::Completed, None)
        .await;
    assert_matches!(empty, Err(BookingError::InvalidStateTransition { .. }));

    let other = h.confirmed_booking(3, 11).await;
    h.service
        .update_session_status(other.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();
    let view = h.service
        .update_main_status(other.booking_id, BookingStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(view.booking.session_status, BookingStatus::Completed);
    assert_eq!(view.progress.completed_count, 1);
}

#[tokio::test]
async fn test_completed_session_publishes_events() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(2, 10).await;
    let mut events = h.ctx.events.subscribe();

    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();

    assert_matches!(
        events.recv().await.unwrap(),
        DomainEvent::SessionStatusChanged { from: SessionStatus::Pending, to: SessionStatus::Completed, .. }
    );
    assert_matches!(
        events.recv().await.unwrap(),
        DomainEvent::SessionCompleted { session_number: 1, .. }
    );
}

#[tokio::test]
async fn test_list_bookings_splits_current_and_history() {
    let h = harness(2).await;

    let upcoming = h.confirmed_booking(1, 20).await;
    let today = h.confirmed_booking(1, 5).await;

    let cancelled = h.confirmed_booking(2, 12).await;
    h.service
        .update_main_status(cancelled.booking_id, BookingStatus::Cancelled, Some("moved city".to_string()))
        .await
        .unwrap();

    // Unpaid booking of the same user counts towards sessions but not amount paid
    h.open(draft(h.clinic_id, "patient-1", 1, 25, time(10, 30))).await.unwrap();
    // Another user's booking is never listed
    h.open(draft(h.clinic_id, "patient-2", 1, 25, time(10, 0))).await.unwrap();

    let list = h.service.list_bookings("patient-1").await;

    assert_eq!(list.summary.total_bookings, 4);
    assert_eq!(list.summary.current_count, 3);
    assert_eq!(list.summary.history_count, 1);
    assert_eq!(list.summary.total_sessions_purchased, 5);
    assert_eq!(list.summary.total_amount_paid, 3 * 150_000);

    assert_eq!(list.current[0].booking.booking_id, today.booking_id);
    assert!(list.current[0].progress.has_today_session);
    assert_eq!(list.current[1].booking.booking_id, upcoming.booking_id);
    assert_eq!(list.history[0].booking.booking_id, cancelled.booking_id);
}

#[tokio::test]
async fn test_history_classification_is_stable_over_time() {
    let h = harness(1).await;
    let booking = h.confirmed_booking(1, 10).await;
    h.service
        .update_session_status(booking.booking_id, 1, SessionStatus::Completed, None)
        .await
        .unwrap();

    let first = h.service.get_booking(booking.booking_id).await.unwrap();
    h.clock.advance(Duration::days(3));
    let later = h.service.get_booking(booking.booking_id).await.unwrap();

    assert_eq!(first.classification, BookingClassification::History);
    assert_eq!(later.classification, BookingClassification::History);
    assert_eq!(first.progress, later.progress);
}
