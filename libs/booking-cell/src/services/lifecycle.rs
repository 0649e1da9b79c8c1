// libs/booking-cell/src/services/lifecycle.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::error::BookingError;
use crate::models::{RescheduleEntry, Session, SessionStatus};

/// Owns the status rules of one session instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionLifecycleService;

impl SessionLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: SessionStatus,
        new_status: SessionStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating session transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid session transition attempted: {} -> {}", current_status, new_status);
            return Err(BookingError::transition(current_status, new_status));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: SessionStatus) -> Vec<SessionStatus> {
        match current_status {
            SessionStatus::Pending => vec![
                SessionStatus::Confirmed,
                SessionStatus::Completed,
                SessionStatus::Cancelled,
                SessionStatus::NoShow,
                SessionStatus::Rescheduled,
            ],
            SessionStatus::Confirmed => vec![
                SessionStatus::Completed,
                SessionStatus::Cancelled,
                SessionStatus::NoShow,
                SessionStatus::Rescheduled,
            ],
            // Re-enters the pending flow at the new slot
            SessionStatus::Rescheduled => vec![SessionStatus::Pending],
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::NoShow => vec![],
        }
    }

    /// Apply a caller-requested status. `Pending` and `Rescheduled` are only reachable through `reschedule`.
    pub fn apply_status(
        &self,
        session: &mut Session,
        new_status: SessionStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, BookingError> {
        if matches!(new_status, SessionStatus::Pending | SessionStatus::Rescheduled) {
            return Err(BookingError::transition(session.status, new_status));
        }

        self.validate_status_transition(session.status, new_status)?;

        let previous = session.status;
        session.status = new_status;
        session.status_reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        session.updated_at = now;

        info!("Session {} transitioned: {} -> {}", session.session_number, previous, new_status);
        Ok(previous)
    }

    pub fn ensure_reschedulable(&self, session: &Session) -> Result<(), BookingError> {
        self.validate_status_transition(session.status, SessionStatus::Rescheduled)
    }

    /// Move a session to a new slot. The target slot must already be verified as available.
    ///
    /// The session passes through `Rescheduled` and lands in `Pending`, awaiting a new confirmation.
    pub fn reschedule(
        &self,
        session: &mut Session,
        new_date: NaiveDate,
        new_time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<RescheduleEntry, BookingError> {
        self.ensure_reschedulable(session)?;

        if session.date == new_date && session.time == new_time {
            return Err(BookingError::ValidationError(
                "Session is already scheduled at that slot".to_string(),
            ));
        }

        let entry = RescheduleEntry {
            old_date: session.date,
            old_time: session.time,
            new_date,
            new_time,
            changed_at: now,
        };

        session.status = SessionStatus::Rescheduled;
        session.reschedule_history.push(entry.clone());
        session.date = new_date;
        session.time = new_time;

        self.validate_status_transition(session.status, SessionStatus::Pending)?;
        session.status = SessionStatus::Pending;
        session.status_reason = None;
        session.updated_at = now;

        info!(
            "Session {} rescheduled from {} {} to {} {}",
            session.session_number, entry.old_date, entry.old_time, new_date, new_time
        );
        Ok(entry)
    }
}
