//! main.rs — TDOA emitter simulator entry point
//!
//! Runs two concurrent loops:
//!   1. Sim loop: moves the object, generates one emission per epoch and sends
//!      the station reports to the hub over UDP
//!   2. Control server: POST /config sets the object speed (km/h), /ws streams
//!      ground-truth telemetry and accepts pause/resume/speed commands

mod object_sim;
mod signal_physics;
mod udp_tx;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tdoa_types::Station;
use tokio::sync::{RwLock, broadcast};
use tokio::time::interval;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use object_sim::{ObjectConfig, ObjectSim};
use signal_physics::SignalConfig;
use udp_tx::UdpTransmitter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tdoa-sim", about = "TDOA emitter simulator")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// UDP hub address
    #[arg(long, default_value = "127.0.0.1:4002")]
    hub_addr: String,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Control server port
    #[arg(long, default_value = "9090")]
    ctrl_port: u16,
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct SimState {
    sim: ObjectSim,
    paused: bool,
    epoch_counter: u32,
    /// Time multiplier
    speed: f64,
    /// Simulator-relative clock, milliseconds
    clock_ms: f64,
    last_telemetry: Option<String>,
}

type SharedState = Arc<RwLock<SimState>>;

#[derive(Clone)]
struct AppState {
    sim: SharedState,
    telem_tx: broadcast::Sender<String>,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tdoa_simulator=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config)
        .unwrap_or_else(|_| include_str!("../config.toml").to_string());
    let cfg: FullConfig = toml::from_str(&config_str)
        .with_context(|| format!("invalid simulator config {}", args.config))?;

    info!(
        "📡 TDOA simulator starting: {} stations, object at {:?} doing {} km/h",
        cfg.stations.len(), cfg.object.start, cfg.object.speed_kmh
    );

    let shared: SharedState = Arc::new(RwLock::new(SimState {
        sim: ObjectSim::new(&cfg.object, cfg.stations.clone()),
        paused: false,
        epoch_counter: 0,
        speed: args.speed,
        clock_ms: 0.0,
        last_telemetry: None,
    }));

    let transmitter = Arc::new(
        UdpTransmitter::new(&args.hub_addr).context("failed to bind UDP socket")?,
    );

    let (telem_tx, _) = broadcast::channel::<String>(64);

    tokio::spawn(sim_loop(
        shared.clone(),
        transmitter,
        telem_tx.clone(),
        cfg.simulation.emit_rate_hz,
        cfg.signal.clone(),
    ));

    let ctrl_addr = format!("0.0.0.0:{}", args.ctrl_port);
    info!("🖥  Control server at http://{ctrl_addr} (POST /config, ws /ws)");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/config", post(update_config))
        .route("/health", get(|| async { "tdoa-sim ok" }))
        .with_state(AppState { sim: shared, telem_tx })
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(&ctrl_addr).await
        .with_context(|| format!("failed to bind {ctrl_addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Sim loop ──────────────────────────────────────────────────────────────────

async fn sim_loop(
    state: SharedState,
    tx: Arc<UdpTransmitter>,
    telem: broadcast::Sender<String>,
    emit_rate_hz: f64,
    signal: SignalConfig,
) {
    let epoch_ms = (1000.0 / emit_rate_hz.max(0.01)) as u64;
    let mut ticker = interval(Duration::from_millis(epoch_ms.max(1)));

    info!("⏱ Sim loop running at {emit_rate_hz} Hz ({epoch_ms}ms epoch)");

    loop {
        ticker.tick().await;

        let (emission, telemetry) = {
            let mut s = state.write().await;
            if s.paused { continue; }

            let dt = (epoch_ms as f64 / 1000.0) * s.speed;
            let mut rng = rand::thread_rng();
            s.sim.tick(dt, &mut rng);
            s.clock_ms += dt * 1000.0;
            s.epoch_counter += 1;

            let emission = signal_physics::generate_emission(
                uuid::Uuid::new_v4().to_string(),
                s.sim.object.pos,
                &s.sim.stations,
                s.clock_ms,
                &signal,
                &mut rng,
            );

            let telemetry = telemetry_json(s.epoch_counter, &emission, &s.sim);
            s.last_telemetry = Some(telemetry.clone());

            if s.epoch_counter % 20 == 0 {
                info!(
                    "epoch={} | object=({:.0}, {:.0}) {:.0} km/h | {} reports",
                    s.epoch_counter, s.sim.object.pos.x, s.sim.object.pos.y,
                    s.sim.object.speed_kmh, emission.reports.len()
                );
            }
            (emission, telemetry)
        };

        tx.send_emission(&emission);
        let _ = telem.send(telemetry);
    }
}

/// Ground-truth frame for `/ws` subscribers
fn telemetry_json(epoch: u32, emission: &signal_physics::Emission, sim: &ObjectSim) -> String {
    serde_json::json!({
        "type":       "telemetry",
        "epoch":      epoch,
        "id":         emission.id,
        "emitted_at": emission.emitted_at_ms,
        "truth":      emission.truth,
        "object":     sim.object,
        "reports":    emission.reports.len(),
        "stations":   sim.stations,
    }).to_string()
}

// ── Speed endpoint ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeedConfig {
    object_speed: f64,
}

async fn update_config(
    State(app): State<AppState>,
    Json(body): Json<SpeedConfig>,
) -> Result<Json<SpeedConfig>, (StatusCode, Json<serde_json::Value>)> {
    if !body.object_speed.is_finite() || body.object_speed < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "objectSpeed must be a non-negative number" })),
        ));
    }

    let mut s = app.sim.write().await;
    s.sim.set_speed_kmh(body.object_speed);
    info!("🚀 Object speed set to {} km/h", body.object_speed);
    Ok(Json(SpeedConfig { object_speed: s.sim.object.speed_kmh }))
}

// ── WebSocket control handler ─────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, app))
}

async fn handle_ws(mut socket: WebSocket, app: AppState) {
    let mut telem_rx = app.telem_tx.subscribe();

    if let Some(telem) = app.sim.read().await.last_telemetry.clone() {
        let _ = socket.send(Message::Text(telem)).await;
    }

    loop {
        tokio::select! {
            Ok(msg) = telem_rx.recv() => {
                if socket.send(Message::Text(msg)).await.is_err() { break; }
            }
            Some(Ok(Message::Text(cmd))) = socket.recv() => {
                handle_command(&app.sim, &cmd).await;
            }
            else => break,
        }
    }
}

/// `{ "cmd": "pause" }`, `{ "cmd": "set_speed", "args": { "speed": 2.0 } }`, ...
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "cmd", content = "args", rename_all = "snake_case")]
enum ControlCommand {
    Pause,
    Resume,
    /// Time multiplier, clamped to 0.1..=20
    SetSpeed { speed: f64 },
    SetObjectSpeed {
        #[serde(rename = "objectSpeed")]
        object_speed: f64,
    },
}

async fn handle_command(state: &SharedState, raw: &str) {
    let cmd: ControlCommand = match serde_json::from_str(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Ignoring control message: {e}");
            return;
        }
    };
    let mut s = state.write().await;
    match cmd {
        ControlCommand::Pause => { s.paused = true; info!("⏸ Sim paused"); }
        ControlCommand::Resume => { s.paused = false; info!("▶ Sim resumed"); }
        ControlCommand::SetSpeed { speed } if speed.is_finite() => {
            s.speed = speed.clamp(0.1, 20.0);
            info!("⚡ Sim speed set to {}×", s.speed);
        }
        ControlCommand::SetObjectSpeed { object_speed } if object_speed.is_finite() => {
            s.sim.set_speed_kmh(object_speed);
            info!("🚀 Object speed set to {} km/h", s.sim.object.speed_kmh);
        }
        other => warn!("Rejected control command {other:?}"),
    }
}

// ── Config structs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FullConfig {
    simulation: SimulationConfig,
    object:     ObjectConfig,
    #[serde(default)]
    signal:     SignalConfig,
    #[serde(default = "tdoa_types::default_stations")]
    stations:   Vec<Station>,
}

#[derive(Debug, Deserialize)]
struct SimulationConfig {
    emit_rate_hz: f64,
}
