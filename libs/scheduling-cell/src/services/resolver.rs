// libs/scheduling-cell/src/services/resolver.rs
use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::error::SchedulingError;
use crate::models::{ClinicCalendar, DateAvailability, Slot};

/// Anything that may occupy a clinic slot.
pub trait SlotHolder {
    fn slot_date(&self) -> NaiveDate;
    fn slot_time(&self) -> NaiveTime;
    /// Whether the holder currently counts against slot capacity.
    fn holds_slot(&self) -> bool;
}

/// Slot occupancy of a single clinic, keyed by (date, time).
#[derive(Debug, Default, Clone)]
pub struct OccupancyIndex {
    counts: HashMap<(NaiveDate, NaiveTime), u32>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from holders of one clinic, skipping those that release their slot.
    pub fn from_holders<'a, H, I>(holders: I) -> Self
    where
        H: SlotHolder + 'a,
        I: IntoIterator<Item = &'a H>,
    {
        let mut index = Self::new();
        for holder in holders.into_iter().filter(|h| h.holds_slot()) {
            index.record(holder.slot_date(), holder.slot_time());
        }
        index
    }

    pub fn record(&mut self, date: NaiveDate, time: NaiveTime) {
        *self.counts.entry((date, time)).or_insert(0) += 1;
    }

    pub fn release(&mut self, date: NaiveDate, time: NaiveTime) {
        if let Some(count) = self.counts.get_mut(&(date, time)) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(&(date, time));
            }
        }
    }

    pub fn booked(&self, date: NaiveDate, time: NaiveTime) -> u32 {
        self.counts.get(&(date, time)).copied().unwrap_or(0)
    }
}

/// Computes remaining slot capacity from a calendar and its occupancy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotResolver;

impl SlotResolver {
    pub fn new() -> Self {
        Self
    }

    /// Slots for `date` given the existing holders of that clinic. Holders on other dates are ignored.
    pub fn resolve_slots<'a, H, I>(&self, calendar: &ClinicCalendar, date: NaiveDate, existing: I) -> Vec<Slot>
    where
        H: SlotHolder + 'a,
        I: IntoIterator<Item = &'a H>,
    {
        let index = OccupancyIndex::from_holders(existing.into_iter().filter(|h| h.slot_date() == date));
        self.resolve_indexed(calendar, date, &index)
    }

    pub fn resolve_indexed(&self, calendar: &ClinicCalendar, date: NaiveDate, index: &OccupancyIndex) -> Vec<Slot> {
        if !calendar.is_bookable(date) {
            debug!("Clinic {} has no slots on {}", calendar.clinic_id, date);
            return Vec::new();
        }

        calendar
            .slot_times()
            .into_iter()
            .map(|time| Slot::new(date, time, calendar.capacity_per_slot, index.booked(date, time)))
            .collect()
    }

    /// Resolve a single (date, time) and fail unless it can take one more booking.
    pub fn check_slot(
        &self,
        calendar: &ClinicCalendar,
        date: NaiveDate,
        time: NaiveTime,
        index: &OccupancyIndex,
    ) -> Result<Slot, SchedulingError> {
        if !calendar.booking_window.contains(date) {
            return Err(SchedulingError::OutOfBookingWindow { date });
        }

        self.resolve_indexed(calendar, date, index)
            .into_iter()
            .find(|slot| slot.time == time)
            .filter(Slot::is_available)
            .ok_or(SchedulingError::SlotUnavailable { date, time })
    }

    /// Prefer `from` itself, otherwise the soonest later date with an available slot.
    pub fn next_available_date(
        &self,
        calendar: &ClinicCalendar,
        index: &OccupancyIndex,
        from: NaiveDate,
    ) -> Option<NaiveDate> {
        let mut date = from.max(calendar.booking_window.start_date);

        while date <= calendar.booking_window.end_date {
            if self.resolve_indexed(calendar, date, index).iter().any(Slot::is_available) {
                return Some(date);
            }
            date = date.succ_opt()?;
        }

        None
    }

    /// Dates of a `YYYY-MM` month that still have at least one available slot.
    pub fn available_dates_in_month(
        &self,
        calendar: &ClinicCalendar,
        index: &OccupancyIndex,
        month: &str,
    ) -> Result<Vec<DateAvailability>, SchedulingError> {
        let (first, last) = parse_month(month)?;

        let dates = first
            .iter_days()
            .take_while(|date| *date <= last)
            .filter_map(|date| {
                let slots = self.resolve_indexed(calendar, date, index);
                slots
                    .iter()
                    .any(Slot::is_available)
                    .then_some(DateAvailability { date, slots })
            })
            .collect();

        Ok(dates)
    }
}

/// First and last day of a `YYYY-MM` month.
pub fn parse_month(month: &str) -> Result<(NaiveDate, NaiveDate), SchedulingError> {
    let invalid = || SchedulingError::InvalidMonth(month.to_string());

    let (year, month_number) = month.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month_number: u32 = month_number.parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, month_number, 1).ok_or_else(invalid)?;
    let next_month_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month_number + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok((first, next_month_first - Duration::days(1)))
}
