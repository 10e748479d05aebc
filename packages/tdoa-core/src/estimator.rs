//! estimator.rs — Completed group → position estimate
//!
//! Stateless pipeline stage: derive baseline-relative deltas from the group's
//! timestamps, pick the configured initial guess, run the solver.
//! Configuration is validated once at construction; a bad propagation speed
//! or layout makes the estimator unbuildable rather than failing per call.

use std::ops::ControlFlow;

use tdoa_types::Point2D;
use tracing::{debug, warn};

use crate::aggregator::{AggregatorConfig, CompletedGroup, MeasurementAggregator};
use crate::config::EstimatorConfig;
use crate::error::{ConfigError, InvalidMeasurement};
use crate::layout::StationLayout;
use crate::model::{TdoaModel, TdoaObservation};
use crate::solver::{self, IterationReport, PositionEstimate, SolverConfig};

#[derive(Debug, Clone)]
pub struct PositionEstimator {
    layout: StationLayout,
    propagation_speed: f64,
    timestamp_scale: f64,
    initial_guess: Point2D,
    solver: SolverConfig,
}

impl PositionEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        let c = config.propagation_speed;
        if !c.is_finite() || c == 0.0 {
            return Err(ConfigError::InvalidPropagationSpeed(c));
        }
        let scale = config.timestamp_scale;
        if !scale.is_finite() || scale == 0.0 {
            return Err(ConfigError::InvalidTimestampScale(scale));
        }
        config.solver.validate()?;

        let layout = StationLayout::new(config.stations.clone())?;
        let initial_guess = config.initial_guess.resolve(&layout);
        if !initial_guess.is_finite() {
            return Err(ConfigError::NonFiniteInitialGuess);
        }

        Ok(Self {
            layout,
            propagation_speed: c,
            timestamp_scale: scale,
            initial_guess,
            solver: config.solver.clone(),
        })
    }

    pub fn layout(&self) -> &StationLayout { &self.layout }

    pub fn initial_guess(&self) -> Point2D { self.initial_guess }

    pub fn solver_config(&self) -> &SolverConfig { &self.solver }

    /// Aggregator keyed on this estimator's layout, so completed groups
    /// arrive in the order `estimate` expects.
    pub fn aggregator(&self, config: AggregatorConfig) -> MeasurementAggregator {
        MeasurementAggregator::new(self.layout.clone(), config)
    }

    /// Baseline-relative deltas for a group collected under this layout.
    pub fn observation(&self, group: &CompletedGroup) -> Result<TdoaObservation, InvalidMeasurement> {
        if !group.matches(&self.layout) {
            return Err(InvalidMeasurement::LayoutMismatch {
                id: group.id().to_string(),
                expected: self.layout.stations().iter().map(|s| s.id.clone()).collect(),
                got: group.station_ids().to_vec(),
            });
        }
        Ok(TdoaObservation::from_arrivals(group.arrivals(), self.timestamp_scale, self.propagation_speed))
    }

    pub fn estimate(&self, group: &CompletedGroup) -> Result<PositionEstimate, InvalidMeasurement> {
        self.estimate_with_observer(group, |_| ControlFlow::Continue(()))
    }

    /// Estimate with a per-iteration hook; `Break` aborts the solve.
    pub fn estimate_with_observer<F>(
        &self,
        group: &CompletedGroup,
        observer: F,
    ) -> Result<PositionEstimate, InvalidMeasurement>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        let observation = self.observation(group)?;
        let model = TdoaModel::new(&self.layout, &observation);
        let estimate = solver::solve_with_observer(&model, self.initial_guess, &self.solver, observer);

        if estimate.converged() {
            debug!(
                "measurement {} → ({:.2}, {:.2}) in {} iterations",
                group.id(), estimate.x, estimate.y, estimate.iterations
            );
        } else {
            warn!(
                "measurement {}: solver stopped without converging ({:?} after {} iterations, loss={:.3e})",
                group.id(), estimate.stop, estimate.iterations, estimate.loss
            );
        }
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialGuess;
    use crate::solver::StopReason;

    /// Arrival times (ms) for an emission at `truth` sent at t0
    fn arrivals_ms(layout: &StationLayout, truth: Point2D, t0_ms: f64) -> Vec<f64> {
        // 0.3 m/ns = 3e5 m/ms
        layout.stations().iter().map(|s| t0_ms + s.distance_to(truth) / 3e5).collect()
    }

    #[test]
    fn rejects_zero_or_nan_speed() {
        for c in [0.0, f64::NAN, f64::INFINITY] {
            let cfg = EstimatorConfig { propagation_speed: c, ..Default::default() };
            assert!(matches!(
                PositionEstimator::new(&cfg),
                Err(ConfigError::InvalidPropagationSpeed(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_scale() {
        let cfg = EstimatorConfig { timestamp_scale: 0.0, ..Default::default() };
        assert_eq!(
            PositionEstimator::new(&cfg).unwrap_err(),
            ConfigError::InvalidTimestampScale(0.0)
        );
    }

    #[test]
    fn centroid_is_default_guess() {
        let est = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let g = est.initial_guess();
        assert!((g.x - 100_000.0 / 3.0).abs() < 1e-9);
        assert!((g.y - 100_000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn recovers_emitter_from_millisecond_timestamps() {
        let cfg = EstimatorConfig {
            initial_guess: InitialGuess::Fixed { x: 50_000.0, y: 50_000.0 },
            ..Default::default()
        };
        let estimator = PositionEstimator::new(&cfg).unwrap();
        let truth = Point2D::new(30_000.0, 40_000.0);
        // Small t0 keeps sub-nanosecond resolution in the f64 timestamps
        let group = CompletedGroup::new("m1", estimator.layout(), arrivals_ms(estimator.layout(), truth, 1_000.0));

        let est = estimator.estimate(&group).unwrap();
        assert!(est.position().dist(&truth) < 1.0, "got ({}, {})", est.x, est.y);
        assert_eq!(est.stop, StopReason::Converged);
    }

    #[test]
    fn observation_uses_baseline_deltas() {
        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let group = CompletedGroup::new("m1", estimator.layout(), vec![5.0, 4.0, 6.0]);
        let obs = estimator.observation(&group).unwrap();
        assert_eq!(obs.deltas, vec![1e6, -1e6]);
        assert_eq!(obs.propagation_speed, 0.3);
    }

    #[test]
    fn cancelled_solve_is_not_converged() {
        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let truth = Point2D::new(30_000.0, 40_000.0);
        let group = CompletedGroup::new("m1", estimator.layout(), arrivals_ms(estimator.layout(), truth, 1.0));

        let est = estimator
            .estimate_with_observer(&group, |r| {
                if r.iteration == 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
            })
            .unwrap();
        assert_eq!(est.stop, StopReason::Cancelled);
        assert!(!est.converged());
        assert!(est.iterations < estimator.solver_config().max_iterations);
    }

    #[test]
    fn short_group_is_refused() {
        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        // Right station ids, one arrival missing
        let group = CompletedGroup::new("m1", estimator.layout(), vec![1.0, 1.0001]);
        assert!(matches!(
            estimator.estimate(&group),
            Err(InvalidMeasurement::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn group_from_reordered_aggregator_is_refused() {
        let stations = tdoa_types::default_stations();
        let reordered = StationLayout::new(vec![
            stations[2].clone(),
            stations[0].clone(),
            stations[1].clone(),
        ]).unwrap();
        let mut agg = MeasurementAggregator::new(reordered, AggregatorConfig::default());
        let mut completed = None;
        for (src, t) in [("station1", 10.0), ("station2", 10.1), ("station3", 10.05)] {
            if let Ok(crate::aggregator::Ingest::Completed(g)) =
                agg.ingest(&tdoa_types::MeasurementReport::new("m1", src, t))
            {
                completed = Some(g);
            }
        }
        let group = completed.unwrap();

        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        match estimator.estimate(&group) {
            Err(InvalidMeasurement::LayoutMismatch { id, expected, got }) => {
                assert_eq!(id, "m1");
                assert_eq!(expected, ["station1", "station2", "station3"]);
                assert_eq!(got, ["station3", "station1", "station2"]);
            }
            other => panic!("expected layout mismatch, got {other:?}"),
        }
    }

    #[test]
    fn own_aggregator_groups_are_accepted() {
        let estimator = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let mut agg = estimator.aggregator(AggregatorConfig::default());
        let truth = Point2D::new(20_000.0, 20_000.0);
        let arrivals = arrivals_ms(estimator.layout(), truth, 5.0);
        let mut completed = None;
        for (s, t) in estimator.layout().stations().iter().zip(arrivals).rev() {
            if let Ok(crate::aggregator::Ingest::Completed(g)) =
                agg.ingest(&tdoa_types::MeasurementReport::new("m2", s.id.clone(), t))
            {
                completed = Some(g);
            }
        }
        let est = estimator.estimate(&completed.unwrap()).unwrap();
        assert!(est.converged());
        assert!(est.position().dist(&truth) < 1.0);
    }
}
