use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::{BookingContext, DomainEvent, EventPublisher};
use payment_cell::{spawn_expiry_sweeper, HttpPaymentGateway, PaymentContext};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Clinic Booking API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Shared booking state and the payment gate on top of it
    let booking_ctx = BookingContext::new(config.clone());
    let gateway = Arc::new(HttpPaymentGateway::new(&config));
    let payment_ctx = PaymentContext::new(booking_ctx.clone(), gateway);

    let sweep_every = Duration::from_secs(config.payment_sweep_interval_seconds);
    spawn_expiry_sweeper(payment_ctx.gate.clone(), sweep_every);
    spawn_event_notifier(&booking_ctx.events);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(booking_ctx, payment_ctx)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Hands domain events to downstream notifications. For now they are only logged.
fn spawn_event_notifier(events: &EventPublisher) {
    let mut receiver = events.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event notifier lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::BookingConfirmed { booking_number, .. } => {
            info!("Notify: booking {} confirmed", booking_number);
        }
        DomainEvent::BookingCancelled { booking_number, reason, .. } => {
            info!("Notify: booking {} cancelled ({})", booking_number, reason);
        }
        other => info!("Domain event: {:?}", other),
    }
}
