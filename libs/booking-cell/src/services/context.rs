use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::clock::{Clock, SystemClock};

use crate::services::events::EventPublisher;
use crate::services::store::BookingStore;

/// Shared handles every booking operation runs against.
#[derive(Clone)]
pub struct BookingContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<BookingStore>,
    pub events: EventPublisher,
    pub clock: Arc<dyn Clock>,
}

impl BookingContext {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store: Arc::new(BookingStore::new()),
            events: EventPublisher::default(),
            clock,
        }
    }
}
