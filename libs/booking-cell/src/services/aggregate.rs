// libs/booking-cell/src/services/aggregate.rs
use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::BookingError;
use crate::models::{
    Booking, BookingClassification, BookingProgress, BookingStatus, BookingView, NextSession,
    Session, SessionStatus,
};

impl Booking {
    pub fn progress(&self, today: NaiveDate) -> BookingProgress {
        let completed_count = self.count_sessions(|s| s.status == SessionStatus::Completed);
        let pending_count = self.count_sessions(|s| s.status.holds_slot());

        let next_session = self
            .sessions
            .iter()
            .filter(|s| s.status.holds_slot() && s.date >= today)
            .min_by_key(|s| (s.date, s.time, s.session_number))
            .map(|s| NextSession {
                session_number: s.session_number,
                date: s.date,
                time: s.time,
            });

        let has_today_session = self
            .sessions
            .iter()
            .any(|s| s.status.holds_slot() && s.date == today);

        BookingProgress {
            completed_count,
            pending_count,
            progress_percentage: progress_percentage(completed_count, self.no_of_session_book),
            next_session,
            has_today_session,
        }
    }

    /// Dashboard classification. A pure function of the booking and `today`.
    pub fn classify(&self, progress: &BookingProgress) -> BookingClassification {
        if self.session_status.is_closed() {
            return BookingClassification::History;
        }

        let upcoming = progress.pending_count > 0 && progress.next_session.is_some();
        let partially_completed = progress.completed_count > 0 && progress.pending_count > 0;

        if upcoming || progress.has_today_session || partially_completed {
            BookingClassification::Current
        } else {
            BookingClassification::History
        }
    }

    pub fn view(&self, today: NaiveDate) -> BookingView {
        let progress = self.progress(today);
        let classification = self.classify(&progress);
        BookingView {
            booking: self.clone(),
            progress,
            classification,
        }
    }

    pub fn session(&self, session_number: u32) -> Result<&Session, BookingError> {
        let position = self.locate_session(session_number)?;
        Ok(&self.sessions[position])
    }

    pub fn session_mut(&mut self, session_number: u32) -> Result<&mut Session, BookingError> {
        let position = self.locate_session(session_number)?;
        Ok(&mut self.sessions[position])
    }

    /// The session right after the last scheduled one is reported as locked rather than missing.
    fn locate_session(&self, session_number: u32) -> Result<usize, BookingError> {
        let scheduled = self.sessions.len() as u32;
        if session_number == scheduled + 1 && session_number <= self.no_of_session_book {
            return Err(BookingError::SequenceNotUnlocked { session_number });
        }

        self.sessions
            .iter()
            .position(|s| s.session_number == session_number)
            .ok_or(BookingError::SessionNotFound {
                booking_id: self.booking_id,
                session_number,
            })
    }

    /// Number the next session would get, provided the latest one is completed.
    pub fn next_session_number(&self) -> Result<u32, BookingError> {
        let scheduled = self.sessions.len() as u32;
        if scheduled >= self.no_of_session_book {
            return Err(BookingError::SessionLimitReached {
                limit: self.no_of_session_book,
            });
        }

        match self.sessions.last() {
            Some(last) if last.status == SessionStatus::Completed => Ok(scheduled + 1),
            Some(last) => Err(BookingError::PriorSessionIncomplete {
                session_number: last.session_number,
            }),
            None => Ok(1),
        }
    }

    /// Sessions may only progress once the booking is paid and still open.
    pub fn ensure_active(&self, action: &str) -> Result<(), BookingError> {
        if self.session_status == BookingStatus::Confirmed {
            Ok(())
        } else {
            Err(BookingError::transition(self.session_status, action))
        }
    }

    /// Close every session still holding a slot. Returns how many were released.
    pub fn release_open_sessions(&mut self, reason: &str, now: DateTime<Utc>) -> usize {
        let mut released = 0;
        for session in self.sessions.iter_mut().filter(|s| s.status.holds_slot()) {
            session.status = SessionStatus::Cancelled;
            session.status_reason = Some(reason.to_string());
            session.updated_at = now;
            released += 1;
        }
        released
    }

    pub fn cancel(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> Result<usize, BookingError> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(BookingError::MissingCancellationReason)?;

        if self.session_status.is_closed() {
            return Err(BookingError::transition(self.session_status, BookingStatus::Cancelled));
        }

        let released = self.release_open_sessions(reason, now);
        self.session_status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        self.cancelled_at = Some(now);
        self.updated_at = now;

        info!("Booking {} cancelled, {} sessions released", self.booking_number, released);
        Ok(released)
    }

    /// Terminal failure after an unsuccessful or abandoned payment.
    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) {
        self.release_open_sessions(reason, now);
        self.session_status = BookingStatus::Failed;
        self.cancellation_reason = Some(reason.to_string());
        self.updated_at = now;
    }

    /// Recompute the aggregate status after a session mutation.
    ///
    /// A booking whose latest session ended without being completed, and with nothing else
    /// holding a slot, can never progress again and is closed as cancelled.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.session_status.is_closed() {
            return;
        }

        let completed = self.count_sessions(|s| s.status == SessionStatus::Completed);
        if self.session_status == BookingStatus::Confirmed && completed >= self.no_of_session_book {
            debug!("All sessions of booking {} completed", self.booking_number);
            self.session_status = BookingStatus::Completed;
            self.updated_at = now;
            return;
        }

        let open = self.sessions.iter().any(|s| s.status.holds_slot());
        let stranded = match self.sessions.last() {
            Some(last) => !open && last.status != SessionStatus::Completed,
            None => false,
        };
        if stranded {
            let reason = self
                .sessions
                .last()
                .and_then(|s| s.status_reason.clone())
                .unwrap_or_else(|| "no session left to attend".to_string());
            info!("Booking {} has no session left to attend, closing it", self.booking_number);
            self.session_status = BookingStatus::Cancelled;
            self.cancellation_reason = Some(reason);
            self.cancelled_at = Some(now);
            self.updated_at = now;
        }
    }

    fn count_sessions(&self, predicate: impl Fn(&Session) -> bool) -> u32 {
        self.sessions.iter().filter(|s| predicate(s)).count() as u32
    }
}

pub fn progress_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    // round half up
    let percentage = (200 * u64::from(completed) + u64::from(total)) / (2 * u64::from(total));
    percentage.min(100) as u8
}

/// Today's sessions first, then the soonest next session, then the newest booking.
pub fn current_booking_order(a: &BookingView, b: &BookingView) -> Ordering {
    b.progress
        .has_today_session
        .cmp(&a.progress.has_today_session)
        .then_with(|| {
            let a_next = a.progress.next_session.as_ref().map(|n| (n.date, n.time));
            let b_next = b.progress.next_session.as_ref().map(|n| (n.date, n.time));
            match (a_next, b_next) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
        .then_with(|| b.booking.created_at.cmp(&a.booking.created_at))
        .then_with(|| a.booking.booking_number.cmp(&b.booking.booking_number))
}

pub fn history_booking_order(a: &BookingView, b: &BookingView) -> Ordering {
    b.booking
        .created_at
        .cmp(&a.booking.created_at)
        .then_with(|| a.booking.booking_number.cmp(&b.booking.booking_number))
}
