//! Estimator configuration, loadable from TOML.
//!
//! ```toml
//! propagation_speed = 0.3     # metres per nanosecond
//! timestamp_scale = 1e6       # receivedAt in ms → ns
//!
//! [initial_guess]
//! kind = "fixed"
//! x = 50000.0
//! y = 50000.0
//!
//! [solver]
//! method = "gradient_descent"
//! learning_rate = 0.01
//!
//! [[stations]]
//! id = "station1"
//! x = 0.0
//! y = 0.0
//! ```

use serde::{Deserialize, Serialize};
use tdoa_types::{Point2D, Station};

use crate::aggregator::AggregatorConfig;
use crate::layout::StationLayout;
use crate::solver::SolverConfig;

/// Speed of light in metres per nanosecond
pub const DEFAULT_PROPAGATION_SPEED: f64 = 0.3;

/// Millisecond timestamps → nanoseconds
pub const DEFAULT_TIMESTAMP_SCALE: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InitialGuess {
    /// Mean of the station coordinates
    #[default]
    Centroid,
    Fixed { x: f64, y: f64 },
}

impl InitialGuess {
    pub fn resolve(&self, layout: &StationLayout) -> Point2D {
        match *self {
            InitialGuess::Centroid => layout.centroid(),
            InitialGuess::Fixed { x, y } => Point2D::new(x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Ordered layout, baseline station first
    pub stations: Vec<Station>,
    /// Distance units per scaled time unit
    pub propagation_speed: f64,
    /// Multiplier applied to raw timestamp differences
    pub timestamp_scale: f64,
    pub initial_guess: InitialGuess,
    pub solver: SolverConfig,
    pub aggregator: AggregatorConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            stations: tdoa_types::default_stations(),
            propagation_speed: DEFAULT_PROPAGATION_SPEED,
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            initial_guess: InitialGuess::Centroid,
            solver: SolverConfig::default(),
            aggregator: AggregatorConfig::default(),
        }
    }
}
