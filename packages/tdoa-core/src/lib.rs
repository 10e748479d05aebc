//! # tdoa-core
//!
//! Numerical core of the TDOA positioning suite.
//!
//! ## Pipeline
//! ```text
//!   MeasurementReport ──► MeasurementAggregator ──► CompletedGroup
//!                                                        │
//!                          PositionEstimator ◄───────────┘
//!                            │  deltas: (t1 − tk) · timestamp_scale
//!                            ▼
//!                          solver (TdoaModel + sum of squares)
//!                            │
//!                            ▼
//!                          PositionEstimate { x, y, iterations }
//! ```
//!
//! Everything here is synchronous and single-owner. The solve is CPU-bound and
//! bounded only by `max_iterations`; services should run it off their ingest
//! path (see `backend-rust`).

pub mod aggregator;
pub mod config;
pub mod error;
pub mod estimator;
mod gauss_newton;
pub mod layout;
pub mod loss;
pub mod model;
pub mod solver;

pub use aggregator::{AggregatorConfig, CompletedGroup, Ingest, MeasurementAggregator};
pub use config::{EstimatorConfig, InitialGuess};
pub use error::{ConfigError, InvalidMeasurement};
pub use estimator::PositionEstimator;
pub use layout::StationLayout;
pub use model::{ResidualModel, TdoaModel, TdoaObservation};
pub use solver::{
    solve, solve_with_observer, IterationReport, PositionEstimate, SolverConfig, SolverMethod,
    StopReason,
};
