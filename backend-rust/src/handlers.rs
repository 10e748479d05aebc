use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use socketioxide::extract::SocketRef;
use tdoa_core::PositionEstimator;
use tdoa_types::Station;
use tracing::info;

use crate::state::{HubStats, SharedStats};

// ─── Shared Handler State ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<PositionEstimator>,
    pub stats: SharedStats,
}

// ─── Socket.IO ────────────────────────────────────────────────────────────────

/// New dashboard client: send the layout and the latest fix so it can draw
/// immediately; live fixes follow as `position-update` broadcasts.
pub async fn on_connect(socket: SocketRef, app: AppState) {
    let socket_id = socket.id.to_string();
    info!("Client connected: {socket_id}");

    socket.on_disconnect(move |_: SocketRef| async move {
        info!("Client disconnected: {socket_id}");
    });

    for (event, payload) in greeting(&app).await {
        let _ = socket.emit(event, &payload);
    }
}

/// Events sent to a client on connect, in order
pub async fn greeting(app: &AppState) -> Vec<(&'static str, Value)> {
    let mut events = vec![("stations", json!(app.estimator.layout().stations()))];
    if let Some(last) = app.stats.read().await.last_estimate.clone() {
        events.push(("position-update", json!(last)));
    }
    events
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "tdoa-backend" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationsResponse {
    /// First entry is the baseline every delta is measured against
    pub stations: Vec<Station>,
    pub baseline: String,
}

pub async fn stations(State(app): State<AppState>) -> Json<StationsResponse> {
    let layout = app.estimator.layout();
    Json(StationsResponse {
        stations: layout.stations().to_vec(),
        baseline: layout.baseline().id.clone(),
    })
}

pub async fn stats(State(app): State<AppState>) -> Json<HubStats> {
    Json(app.stats.read().await.clone())
}
