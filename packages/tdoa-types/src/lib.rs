//! # tdoa-types
//!
//! Shared measurement and position structures for the TDOA positioning suite.
//!
//! These types are used by:
//! - `backend-rust`: decoding station reports from UDP and emitting position updates
//! - `packages/tdoa-core`: station geometry for the residual model and aggregator
//! - `packages/tdoa-simulator`: producing station reports for a simulated emitter
//!
//! ## Coordinate Conventions
//!
//! - **Plane frame**: 2D Cartesian, X = east, Y = north, units are whatever the
//!   station layout is expressed in (metres for the default layout)
//! - **Timestamps**: `receivedAt` is a plain number in a consistent unit
//!   (milliseconds by default); the estimator's `timestamp_scale` converts
//!   differences into the unit the propagation speed is expressed against
//!
//! ## Wire format
//! Station reports travel as JSON with camelCase keys:
//! `{ "id": "...", "sourceId": "station1", "receivedAt": 1234.5 }`

use serde::{Deserialize, Serialize};

// ── Geometry ──────────────────────────────────────────────────────────────────

/// 2D point in the plane frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn dist(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

/// Fixed receiver station. Immutable once the layout is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Source identity used in measurement reports (e.g. "station1")
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl Station {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self { id: id.into(), x, y }
    }

    pub fn position(&self) -> Point2D { Point2D::new(self.x, self.y) }

    /// Euclidean distance from this station to `p`
    pub fn distance_to(&self, p: Point2D) -> f64 {
        self.position().dist(&p)
    }
}

/// Default three-station layout: a 100 km right triangle with the baseline
/// station at the origin.
pub fn default_stations() -> Vec<Station> {
    vec![
        Station::new("station1", 0.0, 0.0),
        Station::new("station2", 100_000.0, 0.0),
        Station::new("station3", 0.0, 100_000.0),
    ]
}

// ── Station report (Station → Hub) ────────────────────────────────────────────

/// One timestamped arrival report from one station for one emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementReport {
    /// Emission identity shared by the reports of all stations
    pub id: String,
    /// Station identity (must match a configured station)
    pub source_id: String,
    /// Arrival timestamp at the station
    pub received_at: f64,
}

impl MeasurementReport {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>, received_at: f64) -> Self {
        Self { id: id.into(), source_id: source_id.into(), received_at }
    }
}

// ── Position update (Hub → renderers) ─────────────────────────────────────────

/// Broadcast to renderers after each completed solve.
/// Renderers only need `x`/`y`; the rest is solve quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Emission identity this estimate belongs to
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// Optimiser iterations used
    pub iterations: u32,
    /// False when the iteration cap was hit
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_camel_case_keys() {
        let raw = r#"{"id":"42","sourceId":"station2","receivedAt":1500.25}"#;
        let report: MeasurementReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report, MeasurementReport::new("42", "station2", 1500.25));

        let back = serde_json::to_value(&report).unwrap();
        assert_eq!(back["sourceId"], "station2");
        assert_eq!(back["receivedAt"], 1500.25);
    }

    #[test]
    fn non_numeric_timestamp_fails_to_decode() {
        let raw = r#"{"id":"42","sourceId":"station2","receivedAt":"soon"}"#;
        assert!(serde_json::from_str::<MeasurementReport>(raw).is_err());
    }

    #[test]
    fn station_distance() {
        let s = Station::new("station1", 0.0, 0.0);
        assert_eq!(s.distance_to(Point2D::new(30_000.0, 40_000.0)), 50_000.0);
        assert_eq!(s.distance_to(Point2D::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn default_layout_has_baseline_first() {
        let stations = default_stations();
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].id, "station1");
        assert_eq!(stations[0].position(), Point2D::default());
    }
}
