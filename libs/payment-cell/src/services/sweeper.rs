// libs/payment-cell/src/services/sweeper.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::gate::PaymentGate;

/// Periodically fails payments that never received a gateway callback.
pub fn spawn_expiry_sweeper(gate: Arc<PaymentGate>, every: Duration) -> JoinHandle<()> {
    // A zero period would panic inside the task
    let every = every.max(Duration::from_secs(1));
    info!("Starting payment expiry sweeper every {:?}", every);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match gate.expire_pending().await {
                Ok(0) => debug!("Expiry sweep found nothing to expire"),
                Ok(expired) => info!("Expiry sweep failed {} stale pending payments", expired),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
