// libs/booking-cell/src/services/store.rs
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scheduling_cell::{ClinicCalendar, OccupancyIndex, Slot, SlotResolver};

use crate::error::BookingError;
use crate::models::{Booking, BookingDraft, BookingStatus, Payment, PaymentStatus, Session};

/// Calendars, bookings and payments behind one transaction boundary.
///
/// Every slot check and the write that depends on it run inside the same `transaction`,
/// so two requests can never both take the last unit of capacity.
#[derive(Debug, Default)]
pub struct BookingStore {
    state: Mutex<StoreState>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` with exclusive access. Operations validate before they mutate,
    /// so an `Err` leaves the state untouched.
    pub async fn transaction<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut StoreState) -> Result<T, E>,
    {
        let mut state = self.state.lock().await;
        operation(&mut state)
    }

    pub async fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&StoreState) -> T,
    {
        let state = self.state.lock().await;
        query(&state)
    }
}

#[derive(Debug, Default)]
pub struct StoreState {
    calendars: HashMap<Uuid, ClinicCalendar>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    orders: HashMap<String, Uuid>,
    booking_sequence: u32,
}

impl StoreState {
    // ==============================================================================
    // CALENDARS AND SLOTS
    // ==============================================================================

    pub fn upsert_calendar(&mut self, calendar: ClinicCalendar) -> Result<(), BookingError> {
        calendar.validate()?;
        info!("Calendar stored for clinic {}", calendar.clinic_id);
        self.calendars.insert(calendar.clinic_id, calendar);
        Ok(())
    }

    pub fn calendar(&self, clinic_id: Uuid) -> Result<&ClinicCalendar, BookingError> {
        self.calendars
            .get(&clinic_id)
            .ok_or(BookingError::CalendarNotFound(clinic_id))
    }

    /// Occupancy of every slot-holding session at a clinic.
    pub fn occupancy(&self, clinic_id: Uuid) -> OccupancyIndex {
        OccupancyIndex::from_holders(
            self.bookings
                .values()
                .filter(|b| b.clinic_id == clinic_id)
                .flat_map(|b| b.sessions.iter()),
        )
    }

    /// Check that one more session fits at (date, time). A session being moved does not count against its own slot.
    pub fn check_reservation(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        today: NaiveDate,
        moving: Option<&Session>,
    ) -> Result<Slot, BookingError> {
        let calendar = self.calendar(clinic_id)?;

        if date < today {
            return Err(BookingError::OutOfBookingWindow { date });
        }

        let mut index = self.occupancy(clinic_id);
        if let Some(session) = moving.filter(|s| s.status.holds_slot()) {
            index.release(session.date, session.time);
        }

        SlotResolver::new()
            .check_slot(calendar, date, time, &index)
            .map_err(|e| {
                warn!("Reservation rejected for clinic {}: {}", clinic_id, e);
                BookingError::from(e)
            })
    }

    // ==============================================================================
    // BOOKINGS AND PAYMENTS
    // ==============================================================================

    pub fn booking(&self, booking_id: Uuid) -> Result<&Booking, BookingError> {
        self.bookings
            .get(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    pub fn booking_mut(&mut self, booking_id: Uuid) -> Result<&mut Booking, BookingError> {
        self.bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    pub fn bookings_for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Booking> + 'a {
        self.bookings.values().filter(move |b| b.user_id == user_id)
    }

    pub fn payment(&self, payment_id: Uuid) -> Result<&Payment, BookingError> {
        self.payments
            .get(&payment_id)
            .ok_or_else(|| BookingError::PaymentNotFound(payment_id.to_string()))
    }

    pub fn payment_id_for_order(&self, gateway_order_id: &str) -> Result<Uuid, BookingError> {
        self.orders
            .get(gateway_order_id)
            .copied()
            .ok_or_else(|| BookingError::PaymentNotFound(gateway_order_id.to_string()))
    }

    /// Both halves of a booking/payment pair, for updates that must land together.
    pub fn booking_with_payment_mut(
        &mut self,
        payment_id: Uuid,
    ) -> Result<(&mut Booking, &mut Payment), BookingError> {
        let payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| BookingError::PaymentNotFound(payment_id.to_string()))?;
        let booking = self
            .bookings
            .get_mut(&payment.booking_id)
            .ok_or(BookingError::BookingNotFound(payment.booking_id))?;
        Ok((booking, payment))
    }

    pub fn pending_payments_created_before(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        let mut expired: Vec<&Payment> = self
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < cutoff)
            .collect();
        expired.sort_by_key(|p| p.created_at);
        expired.into_iter().map(|p| p.payment_id).collect()
    }

    /// Reserve the first session and create the booking with its pending payment in one step.
    pub fn open_booking(
        &mut self,
        draft: BookingDraft,
        gateway_order_id: &str,
        currency: &str,
        now: DateTime<Utc>,
    ) -> Result<(Booking, Payment), BookingError> {
        draft.validate()?;

        if self.orders.contains_key(gateway_order_id) {
            return Err(BookingError::ValidationError(format!(
                "Gateway order {} is already linked to a booking",
                gateway_order_id
            )));
        }

        self.check_reservation(draft.clinic_id, draft.date, draft.time, now.date_naive(), None)?;

        let booking_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        let booking_number = self.next_booking_number(now);

        let booking = Booking {
            booking_id,
            booking_number,
            user_id: draft.user_id,
            patient_details: draft.patient_details,
            treatment_id: draft.treatment_id,
            clinic_id: draft.clinic_id,
            doctor_id: draft.doctor_id,
            no_of_session_book: draft.no_of_session_book,
            sessions: vec![Session::new(1, draft.date, draft.time, now)],
            session_status: BookingStatus::Pending,
            payment_id,
            total_amount: draft.total_amount,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let payment = Payment {
            payment_id,
            booking_id,
            status: PaymentStatus::Pending,
            amount: draft.total_amount,
            currency: currency.to_string(),
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: None,
            paid_at: None,
            failure_reason: None,
            stale_callbacks: 0,
            created_at: now,
            updated_at: now,
        };

        self.orders.insert(payment.gateway_order_id.clone(), payment_id);
        self.payments.insert(payment_id, payment.clone());
        self.bookings.insert(booking_id, booking.clone());

        debug!("Booking {} opened with payment {}", booking.booking_number, payment_id);
        Ok((booking, payment))
    }

    fn next_booking_number(&mut self, now: DateTime<Utc>) -> String {
        self.booking_sequence += 1;
        format!("BK-{}-{:04}", now.format("%Y%m%d"), self.booking_sequence)
    }
}

impl BookingDraft {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.no_of_session_book == 0 {
            return Err(BookingError::ValidationError(
                "no_of_session_book must be at least 1".to_string(),
            ));
        }

        if self.total_amount < 0 {
            return Err(BookingError::ValidationError(
                "total_amount must not be negative".to_string(),
            ));
        }

        if self.patient_details.name.trim().is_empty() || self.patient_details.phone.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "patient name and phone are required".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scheduling_cell::{BookingWindow, WorkingHours};

    use crate::models::PatientDetails;

    fn calendar(clinic_id: Uuid) -> ClinicCalendar {
        ClinicCalendar {
            clinic_id,
            booking_window: BookingWindow {
                start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            },
            working_hours: WorkingHours {
                open: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            },
            slot_duration_minutes: 30,
            off_day: None,
            capacity_per_slot: 1,
            updated_at: Utc::now(),
        }
    }

    fn draft(clinic_id: Uuid, minute: u32) -> BookingDraft {
        BookingDraft {
            user_id: "patient-1".to_string(),
            patient_details: PatientDetails {
                name: "Asha Rao".to_string(),
                phone: "+919800000000".to_string(),
                email: None,
            },
            treatment_id: Uuid::new_v4(),
            clinic_id,
            doctor_id: None,
            no_of_session_book: 2,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            time: NaiveTime::from_hms_opt(10, minute, 0).unwrap(),
            total_amount: 50_000,
        }
    }

    #[test]
    fn test_booking_numbers_are_sequential_and_orders_unique() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 9, 0, 0).unwrap();
        let clinic_id = Uuid::new_v4();
        let store = BookingStore::new();

        tokio_test::block_on(store.transaction(|state| state.upsert_calendar(calendar(clinic_id)))).unwrap();

        let (first, _) = tokio_test::block_on(
            store.transaction(|state| state.open_booking(draft(clinic_id, 0), "order_1", "INR", now)),
        )
        .unwrap();
        let duplicate = tokio_test::block_on(
            store.transaction(|state| state.open_booking(draft(clinic_id, 30), "order_1", "INR", now)),
        );
        let (second, _) = tokio_test::block_on(
            store.transaction(|state| state.open_booking(draft(clinic_id, 30), "order_2", "INR", now)),
        )
        .unwrap();

        assert_eq!(first.booking_number, "BK-20240605-0001");
        assert!(matches!(duplicate, Err(BookingError::ValidationError(_))));
        assert_eq!(second.booking_number, "BK-20240605-0002");

        let payment_id = tokio_test::block_on(store.read(|state| state.payment_id_for_order("order_2"))).unwrap();
        assert_eq!(payment_id, second.payment_id);
    }

    #[test]
    fn test_moving_session_does_not_block_itself() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 9, 0, 0).unwrap();
        let clinic_id = Uuid::new_v4();
        let mut state = StoreState::default();
        state.upsert_calendar(calendar(clinic_id)).unwrap();

        let (booking, _) = state.open_booking(draft(clinic_id, 0), "order_1", "INR", now).unwrap();
        let session = &booking.sessions[0];
        let today = now.date_naive();

        assert!(matches!(
            state.check_reservation(clinic_id, session.date, session.time, today, None),
            Err(BookingError::SlotUnavailable { .. })
        ));
        assert!(state
            .check_reservation(clinic_id, session.date, session.time, today, Some(session))
            .is_ok());
    }

    #[test]
    fn test_expired_pending_payments_are_listed_oldest_first() {
        let clinic_id = Uuid::new_v4();
        let mut state = StoreState::default();
        state.upsert_calendar(calendar(clinic_id)).unwrap();

        let early = Utc.with_ymd_and_hms(2024, 6, 5, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 5, 9, 20, 0).unwrap();
        let (_, second) = state.open_booking(draft(clinic_id, 30), "order_2", "INR", late).unwrap();
        let (_, first) = state.open_booking(draft(clinic_id, 0), "order_1", "INR", early).unwrap();

        let cutoff = Utc.with_ymd_and_hms(2024, 6, 5, 9, 10, 0).unwrap();
        assert_eq!(state.pending_payments_created_before(cutoff), vec![first.payment_id]);

        let all = state.pending_payments_created_before(late + chrono::Duration::minutes(1));
        assert_eq!(all, vec![first.payment_id, second.payment_id]);
    }
}
