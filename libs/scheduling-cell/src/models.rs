// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CLINIC CALENDAR
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BookingWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Booking availability and per-day slot template of one clinic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicCalendar {
    pub clinic_id: Uuid,
    pub booking_window: BookingWindow,
    pub working_hours: WorkingHours,
    pub slot_duration_minutes: u32,
    /// Weekly closing day, `None` when the clinic opens every day.
    pub off_day: Option<Weekday>,
    pub capacity_per_slot: u32,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// DERIVED SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub capacity: u32,
    pub booked_count: u32,
    pub status: SlotStatus,
}

impl Slot {
    pub fn new(date: NaiveDate, time: NaiveTime, capacity: u32, booked_count: u32) -> Self {
        let status = if booked_count < capacity {
            SlotStatus::Available
        } else {
            SlotStatus::Full
        };

        Self {
            date,
            time,
            capacity,
            booked_count,
            status,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}
