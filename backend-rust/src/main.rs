mod config;
mod handlers;
mod solve_worker;
mod state;
mod tdoa_hub;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use socketioxide::SocketIo;
use tdoa_core::PositionEstimator;
use tdoa_types::PositionUpdate;
use tokio::sync::{broadcast, mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use config::HubConfig;
use handlers::{on_connect, AppState};
use state::{HubStats, SharedStats};

// ─── Socket.IO Relay ──────────────────────────────────────────────────────────

async fn run_relay(mut updates: broadcast::Receiver<PositionUpdate>, io: SocketIo) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                let _ = io.emit("position-update", &update);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Relay lagged, skipped {n} position updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tdoa_backend=info,tdoa_core=info,socketioxide=warn".into()),
        )
        .init();

    info!("📍 TDOA Positioning Hub starting...");

    let hub = HubConfig::default();
    let est_cfg = config::load_estimator_config(hub.config_path.as_deref())?;
    let estimator = Arc::new(
        PositionEstimator::new(&est_cfg).context("invalid estimator configuration")?,
    );
    let aggregator = estimator.aggregator(est_cfg.aggregator.clone());
    info!(
        "Baseline {} + {} stations, solver {:?}",
        estimator.layout().baseline().id,
        estimator.layout().others().len(),
        estimator.solver_config().method
    );

    let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
    let (solve_tx, solve_rx) = mpsc::channel(hub.solve_queue);
    let (update_tx, update_rx) = broadcast::channel::<PositionUpdate>(64);

    // Build Socket.IO layer
    let (socket_layer, io) = SocketIo::builder().build_layer();
    let app_state = AppState { estimator: estimator.clone(), stats: stats.clone() };

    let app_sock = app_state.clone();
    io.ns("/", move |socket: socketioxide::extract::SocketRef| {
        let app = app_sock.clone();
        async move {
            on_connect(socket, app).await;
        }
    });

    // Pipeline: UDP ingest → solve worker → Socket.IO relay
    tokio::spawn(tdoa_hub::start_tdoa_hub(hub.udp_port, aggregator, stats.clone(), solve_tx));
    tokio::spawn(solve_worker::run_solve_worker(estimator, solve_rx, stats, update_tx));
    tokio::spawn(run_relay(update_rx, io));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/stations", get(handlers::stations))
        .route("/stats", get(handlers::stats))
        .with_state(app_state)
        .layer(socket_layer)
        .layer(cors);

    let addr = format!("0.0.0.0:{}", hub.http_port);
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
