// libs/scheduling-cell/src/services/calendar.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::error::SchedulingError;
use crate::models::ClinicCalendar;

impl ClinicCalendar {
    /// Reject calendars that could never produce a slot.
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.booking_window.start_date > self.booking_window.end_date {
            return Err(SchedulingError::InvalidCalendar(
                "booking window start_date must not be after end_date".to_string(),
            ));
        }

        if self.working_hours.open >= self.working_hours.close {
            return Err(SchedulingError::InvalidCalendar(
                "working hours must open before they close".to_string(),
            ));
        }

        if self.slot_duration_minutes == 0 {
            return Err(SchedulingError::InvalidCalendar(
                "slot_duration_minutes must be positive".to_string(),
            ));
        }

        if self.capacity_per_slot == 0 {
            return Err(SchedulingError::InvalidCalendar(
                "capacity_per_slot must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// A date is bookable when it lies inside the window and is not the weekly off day.
    pub fn is_bookable(&self, date: NaiveDate) -> bool {
        self.booking_window.contains(date) && self.off_day != Some(date.weekday())
    }

    /// Slot start times of a working day. A slot must end by closing time.
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.slot_duration_minutes));
        let mut times = Vec::new();

        if step <= Duration::zero() {
            return times;
        }

        let mut current = self.working_hours.open;
        loop {
            let (end, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 || end > self.working_hours.close {
                break;
            }
            times.push(current);
            current = end;
        }

        debug!("Clinic {} offers {} slots per day", self.clinic_id, times.len());
        times
    }

    pub fn offers_slot(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.is_bookable(date) && self.slot_times().contains(&time)
    }
}
