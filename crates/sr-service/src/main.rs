//! Signaling Relay
//!
//! Stateless-at-rest WebSocket signaling relay for patient/doctor WebRTC
//! sessions. A single HTTP listener serves:
//!
//! - `GET /ws` - the signaling WebSocket
//! - `GET /health` / `GET /ready` - probes
//! - `GET /metrics` - Prometheus text format
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment (`PORT`, `SR_BIND_ADDRESS`, `SR_ID`)
//! 2. Initialize Prometheus metrics recorder
//! 3. Spawn the router actor (owns all room state)
//! 4. Bind the listener (fail fast on bind errors) and serve
//! 5. Wait for Ctrl+C/SIGTERM, then shut down via the router's
//!    cancellation token

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sr_service::actors::{RelayMetrics, RouterActorHandle};
use sr_service::config::Config;
use sr_service::observability::{
    health_router, init_metrics_recorder, metrics_router, HealthState,
};
use sr_service::transport::{ChannelTransport, GroupSender};
use sr_service::ws::{signaling_router, SignalingState};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sr_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signaling Relay");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        relay_id = %config.relay_id,
        bind_address = %config.bind_address,
        "Configuration loaded successfully"
    );

    // Metrics recorder must be installed before any metric is recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let metrics = RelayMetrics::new();
    let transport = Arc::new(ChannelTransport::new());

    // Spawn the router actor; it owns all room state
    let (router_handle, _router_task) = RouterActorHandle::spawn(
        config.relay_id.clone(),
        Arc::clone(&transport) as Arc<dyn GroupSender>,
        Arc::clone(&metrics),
    );
    info!("Router actor started");

    let shutdown_token = router_handle.child_token();

    // CORS keeps the original deployment contract: any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = signaling_router(SignalingState {
        router: router_handle.clone(),
        transport,
        metrics,
    })
    .merge(health_router(Arc::clone(&health_state)))
    .merge(metrics_router(prometheus_handle))
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        e
    })?;

    // Bind before serving to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        e
    })?;
    info!(addr = %addr, "Listener bound successfully");

    health_state.set_ready();

    let serve_token = shutdown_token.child_token();
    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            serve_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    info!("Signaling Relay running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop advertising readiness before tearing anything down
    health_state.set_not_ready();

    // Cancelling the router propagates to the HTTP server's child token
    router_handle.cancel();

    if tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .is_err()
    {
        error!("HTTP server did not shut down within the deadline");
    }

    info!("Signaling Relay shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
