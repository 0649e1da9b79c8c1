use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{RescheduleEntry, SessionStatus};

pub type EventReceiver = broadcast::Receiver<DomainEvent>;

/// Facts published for the external notifier after a change is committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingConfirmed {
        booking_id: Uuid,
        booking_number: String,
        payment_id: Uuid,
    },
    BookingCancelled {
        booking_id: Uuid,
        booking_number: String,
        reason: String,
    },
    SessionRescheduled {
        booking_id: Uuid,
        session_number: u32,
        change: RescheduleEntry,
    },
    SessionCompleted {
        booking_id: Uuid,
        session_number: u32,
    },
    SessionStatusChanged {
        booking_id: Uuid,
        session_number: u32,
        from: SessionStatus,
        to: SessionStatus,
    },
    PaymentFailed {
        booking_id: Uuid,
        payment_id: Uuid,
        reason: String,
    },
}

impl DomainEvent {
    pub fn booking_id(&self) -> Uuid {
        match self {
            DomainEvent::BookingConfirmed { booking_id, .. }
            | DomainEvent::BookingCancelled { booking_id, .. }
            | DomainEvent::SessionRescheduled { booking_id, .. }
            | DomainEvent::SessionCompleted { booking_id, .. }
            | DomainEvent::SessionStatusChanged { booking_id, .. }
            | DomainEvent::PaymentFailed { booking_id, .. } => *booking_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.sender.send(event).is_err() {
            debug!("Domain event dropped: no subscribers");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
