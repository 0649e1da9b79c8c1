use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("{date} is outside the clinic booking window")]
    OutOfBookingWindow { date: NaiveDate },

    #[error("No remaining capacity at {date} {time}")]
    SlotUnavailable { date: NaiveDate, time: NaiveTime },

    #[error("Invalid clinic calendar: {0}")]
    InvalidCalendar(String),

    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),
}
