//! signal_physics.rs — Station arrival times for one emission
//!
//! 1. True range from the emitter to every station
//! 2. Arrival = emission time + range / c (milliseconds)
//! 3. Optional Gaussian timing jitter per station (ns)
//! 4. Optional per-report drop (a station missing an emission)
//! 5. Reports shuffled, since stations never deliver in layout order
//!
//! Timestamps are on a simulator-relative millisecond clock: epoch-sized
//! values would eat the sub-nanosecond resolution an f64 has near zero.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use tdoa_types::{MeasurementReport, Point2D, Station};

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Metres per second
    pub propagation_speed_mps: f64,
    /// σ of per-station arrival jitter, nanoseconds (0 = exact)
    pub jitter_ns: f64,
    /// Chance each individual report is lost
    pub drop_probability: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self { propagation_speed_mps: 3.0e8, jitter_ns: 0.0, drop_probability: 0.0 }
    }
}

/// Everything one emission produced, plus ground truth for telemetry.
#[derive(Debug, Clone)]
pub struct Emission {
    pub id: String,
    pub emitted_at_ms: f64,
    pub truth: Point2D,
    pub reports: Vec<MeasurementReport>,
}

pub fn generate_emission(
    id: String,
    truth: Point2D,
    stations: &[Station],
    emitted_at_ms: f64,
    cfg: &SignalConfig,
    rng: &mut impl Rng,
) -> Emission {
    let jitter = if cfg.jitter_ns > 0.0 { Normal::new(0.0, cfg.jitter_ns).ok() } else { None };
    let drop_p = if cfg.drop_probability.is_finite() { cfg.drop_probability.clamp(0.0, 1.0) } else { 0.0 };

    let mut reports = Vec::with_capacity(stations.len());
    for s in stations {
        if rng.gen_bool(drop_p) {
            continue;
        }
        let flight_ms = s.distance_to(truth) / cfg.propagation_speed_mps * 1_000.0;
        let jitter_ms = jitter.as_ref().map_or(0.0, |n| n.sample(&mut *rng) * 1e-6);
        reports.push(MeasurementReport::new(id.clone(), s.id.clone(), emitted_at_ms + flight_ms + jitter_ms));
    }
    reports.shuffle(rng);

    Emission { id, emitted_at_ms, truth, reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tdoa_core::{EstimatorConfig, Ingest, PositionEstimator, AggregatorConfig};

    fn emit(truth: Point2D, cfg: &SignalConfig, seed: u64) -> Emission {
        let mut rng = StdRng::seed_from_u64(seed);
        generate_emission("e1".into(), truth, &tdoa_types::default_stations(), 250.0, cfg, &mut rng)
    }

    #[test]
    fn exact_arrivals_follow_range() {
        let e = emit(Point2D::new(30_000.0, 40_000.0), &SignalConfig::default(), 1);
        assert_eq!(e.reports.len(), 3);
        let s1 = e.reports.iter().find(|r| r.source_id == "station1").unwrap();
        // 50 km at 3e8 m/s = 1/6 ms
        assert!((s1.received_at - (250.0 + 50_000.0 / 3.0e5)).abs() < 1e-12);
        assert!(e.reports.iter().all(|r| r.id == "e1"));
    }

    #[test]
    fn certain_drop_loses_everything() {
        let cfg = SignalConfig { drop_probability: 1.0, ..Default::default() };
        assert!(emit(Point2D::new(1.0, 1.0), &cfg, 3).reports.is_empty());
    }

    #[test]
    fn hub_pipeline_recovers_simulated_emitter() {
        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let mut agg = estimator.aggregator(AggregatorConfig::default());
        let truth = Point2D::new(45_000.0, 25_000.0);
        let cfg = SignalConfig { jitter_ns: 0.5, ..Default::default() };

        let mut completed = None;
        for r in &emit(truth, &cfg, 9).reports {
            if let Ingest::Completed(g) = agg.ingest(r).unwrap() {
                completed = Some(g);
            }
        }
        let est = estimator.estimate(&completed.unwrap()).unwrap();
        // 0.5 ns jitter ≈ 15 cm of range noise per station
        assert!(est.position().dist(&truth) < 50.0, "got ({}, {})", est.x, est.y);
    }
}
