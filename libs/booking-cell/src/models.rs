// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use scheduling_cell::{BookingWindow, ClinicCalendar, SlotHolder, WorkingHours};

// ==============================================================================
// SESSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    #[serde(alias = "no-show")]
    NoShow,
}

impl SessionStatus {
    /// Statuses that keep a clinic slot reserved.
    pub fn holds_slot(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed | SessionStatus::Rescheduled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::NoShow)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Confirmed => write!(f, "confirmed"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::Rescheduled => write!(f, "rescheduled"),
            SessionStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// One date/time change of a session. Entries are never edited once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RescheduleEntry {
    pub old_date: NaiveDate,
    pub old_time: NaiveTime,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_number: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: SessionStatus,
    pub reschedule_history: Vec<RescheduleEntry>,
    pub status_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_number: u32, date: NaiveDate, time: NaiveTime, now: DateTime<Utc>) -> Self {
        Self {
            session_number,
            date,
            time,
            status: SessionStatus::Pending,
            reschedule_history: Vec::new(),
            status_reason: None,
            updated_at: now,
        }
    }

    /// The current date/time must be where the last reschedule moved the session to.
    pub fn is_consistent(&self) -> bool {
        if self.session_number == 0 {
            return false;
        }

        let chained = self
            .reschedule_history
            .windows(2)
            .all(|pair| pair[0].new_date == pair[1].old_date && pair[0].new_time == pair[1].old_time);

        let current = self
            .reschedule_history
            .last()
            .map_or(true, |last| last.new_date == self.date && last.new_time == self.time);

        chained && current
    }
}

impl SlotHolder for Session {
    fn slot_date(&self) -> NaiveDate {
        self.date
    }

    fn slot_time(&self) -> NaiveTime {
        self.time
    }

    fn holds_slot(&self) -> bool {
        self.status.holds_slot()
    }
}

// ==============================================================================
// BOOKING AGGREGATE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Failed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientDetails {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub booking_id: Uuid,
    pub booking_number: String,
    /// Identity of the patient account that owns the booking.
    pub user_id: String,
    pub patient_details: PatientDetails,
    pub treatment_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub no_of_session_book: u32,
    pub sessions: Vec<Session>,
    pub session_status: BookingStatus,
    pub payment_id: Uuid,
    /// Minor currency units, computed upstream.
    pub total_amount: i64,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to open a booking with its first session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    pub user_id: String,
    pub patient_details: PatientDetails,
    pub treatment_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub no_of_session_book: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub total_amount: i64,
}

// ==============================================================================
// PAYMENT RECORD
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_id: Uuid,
    /// Lookup reference only; the booking is owned by the store.
    pub booking_id: Uuid,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Late callbacks that arrived after the payment settled.
    pub stale_callbacks: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// DERIVED VIEWS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextSession {
    pub session_number: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingProgress {
    pub completed_count: u32,
    pub pending_count: u32,
    pub progress_percentage: u8,
    pub next_session: Option<NextSession>,
    pub has_today_session: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingClassification {
    Current,
    History,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub progress: BookingProgress,
    pub classification: BookingClassification,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingSummary {
    pub total_bookings: u32,
    pub current_count: u32,
    pub history_count: u32,
    pub total_sessions_purchased: u32,
    pub completed_sessions: u32,
    pub pending_sessions: u32,
    pub total_amount_paid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub current: Vec<BookingView>,
    pub history: Vec<BookingView>,
    pub summary: BookingSummary,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Calendar body of `PUT /calendars/{clinic_id}`; the clinic comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertCalendarRequest {
    pub booking_window: BookingWindow,
    pub working_hours: WorkingHours,
    pub slot_duration_minutes: u32,
    pub off_day: Option<Weekday>,
    pub capacity_per_slot: u32,
}

impl UpsertCalendarRequest {
    pub fn into_calendar(self, clinic_id: Uuid, now: DateTime<Utc>) -> ClinicCalendar {
        ClinicCalendar {
            clinic_id,
            booking_window: self.booking_window,
            working_hours: self.working_hours,
            slot_duration_minutes: self.slot_duration_minutes,
            off_day: self.off_day,
            capacity_per_slot: self.capacity_per_slot,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleSessionRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNextSessionRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSessionStatusRequest {
    pub status: SessionStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMainStatusRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableDatesQuery {
    pub month: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}
