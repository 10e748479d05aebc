//! layout.rs — Ordered receiver station geometry
//!
//! The first station is the baseline: every observed time difference is taken
//! against it, giving `N-1` independent constraints for `N` stations.

use std::collections::HashSet;

use tdoa_types::{Point2D, Station};

use crate::error::ConfigError;

/// Two unknowns need at least two baseline-relative constraints.
pub const MIN_STATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StationLayout {
    stations: Vec<Station>,
}

impl StationLayout {
    pub fn new(stations: Vec<Station>) -> Result<Self, ConfigError> {
        if stations.len() < MIN_STATIONS {
            return Err(ConfigError::InsufficientStations {
                available: stations.len(),
                required: MIN_STATIONS,
            });
        }

        let mut seen = HashSet::new();
        for s in &stations {
            if !s.position().is_finite() {
                return Err(ConfigError::NonFiniteStation(s.id.clone()));
            }
            if !seen.insert(s.id.as_str()) {
                return Err(ConfigError::DuplicateStation(s.id.clone()));
            }
        }

        Ok(Self { stations })
    }

    /// Reference station all deltas are differenced against
    pub fn baseline(&self) -> &Station { &self.stations[0] }

    /// Non-baseline stations, in constraint order
    pub fn others(&self) -> &[Station] { &self.stations[1..] }

    pub fn stations(&self) -> &[Station] { &self.stations }

    pub fn len(&self) -> usize { self.stations.len() }

    pub fn is_empty(&self) -> bool { self.stations.is_empty() }

    /// Position of `source_id` in layout order
    pub fn index_of(&self, source_id: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.id == source_id)
    }

    pub fn centroid(&self) -> Point2D {
        let n = self.stations.len() as f64;
        let (sx, sy) = self.stations.iter()
            .fold((0.0, 0.0), |(sx, sy), s| (sx + s.x, sy + s.y));
        Point2D::new(sx / n, sy / n)
    }
}

impl Default for StationLayout {
    fn default() -> Self {
        Self { stations: tdoa_types::default_stations() }
    }
}
