//! model.rs — TDOA residual model
//!
//! For a candidate position p and stations s_1 (baseline) .. s_N:
//!   d_i       = ||p - s_i||
//!   predicted = (d_1 - d_k) / c            for k = 2..N
//!   residual  = predicted - observed_1k
//!
//! Only the propagation speed is ever divided by, so the model stays defined
//! when the candidate sits exactly on a station.

use tdoa_types::Point2D;

use crate::layout::StationLayout;

/// Anything the solver can minimise: a residual vector as a function of a
/// 2D parameter.
pub trait ResidualModel {
    fn residuals(&self, p: Point2D) -> Vec<f64>;
}

/// Observed time differences against the baseline station, in layout order
/// (`deltas[0]` is station1 − station2, `deltas[1]` is station1 − station3).
#[derive(Debug, Clone, PartialEq)]
pub struct TdoaObservation {
    pub deltas: Vec<f64>,
    /// Signal propagation speed, in distance units per scaled time unit
    pub propagation_speed: f64,
}

impl TdoaObservation {
    /// Derive deltas from raw arrival timestamps (baseline first):
    /// `delta_1k = (t_1 - t_k) * timestamp_scale`
    pub fn from_arrivals(arrivals: &[f64], timestamp_scale: f64, propagation_speed: f64) -> Self {
        let deltas = match arrivals.split_first() {
            Some((t1, rest)) => rest.iter().map(|tk| (t1 - tk) * timestamp_scale).collect(),
            None => Vec::new(),
        };
        Self { deltas, propagation_speed }
    }

    /// Noise-free observation of an emitter at `truth`.
    pub fn exact(layout: &StationLayout, truth: Point2D, propagation_speed: f64) -> Self {
        let d1 = layout.baseline().distance_to(truth);
        let deltas = layout.others().iter()
            .map(|s| (d1 - s.distance_to(truth)) / propagation_speed)
            .collect();
        Self { deltas, propagation_speed }
    }
}

/// Residual function bound to a station layout and one observation.
#[derive(Debug, Clone, Copy)]
pub struct TdoaModel<'a> {
    layout: &'a StationLayout,
    observation: &'a TdoaObservation,
}

impl<'a> TdoaModel<'a> {
    pub fn new(layout: &'a StationLayout, observation: &'a TdoaObservation) -> Self {
        Self { layout, observation }
    }
}

impl ResidualModel for TdoaModel<'_> {
    fn residuals(&self, p: Point2D) -> Vec<f64> {
        let c = self.observation.propagation_speed;
        let d1 = self.layout.baseline().distance_to(p);
        self.layout.others().iter()
            .zip(&self.observation.deltas)
            .map(|(s, observed)| (d1 - s.distance_to(p)) / c - observed)
            .collect()
    }
}
