//! Hub configuration: ports from env, estimator parameters from TOML.

use std::path::Path;

use anyhow::{Context, Result};
use tdoa_core::EstimatorConfig;
use tracing::info;

/// Looked for in the working directory when `TDOA_CONFIG` is unset
const DEFAULT_CONFIG_FILE: &str = "tdoa.toml";

pub struct HubConfig {
    /// HTTP + Socket.IO port (default 3001)
    pub http_port: u16,
    /// UDP port station reports arrive on (default 4002)
    pub udp_port: u16,
    /// Explicit estimator config path; missing file is an error when set
    pub config_path: Option<String>,
    /// Completed groups waiting for the solve worker (default 64)
    pub solve_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            http_port: std::env::var("PORT")
                .ok().and_then(|v| v.parse().ok()).unwrap_or(3001),
            udp_port: std::env::var("TDOA_UDP_PORT")
                .ok().and_then(|v| v.parse().ok()).unwrap_or(4002),
            config_path: std::env::var("TDOA_CONFIG").ok(),
            solve_queue: std::env::var("TDOA_SOLVE_QUEUE")
                .ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(64),
        }
    }
}

pub fn load_estimator_config(explicit: Option<&str>) -> Result<EstimatorConfig> {
    let path = match explicit {
        Some(p) => p,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => DEFAULT_CONFIG_FILE,
        None => {
            info!("No {DEFAULT_CONFIG_FILE} found, using default station layout");
            return Ok(EstimatorConfig::default());
        }
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read estimator config {path}"))?;
    let cfg = parse_estimator_config(&raw)
        .with_context(|| format!("failed to parse estimator config {path}"))?;
    info!("Loaded estimator config from {path} ({} stations)", cfg.stations.len());
    Ok(cfg)
}

pub fn parse_estimator_config(raw: &str) -> Result<EstimatorConfig> {
    Ok(toml::from_str(raw)?)
}
