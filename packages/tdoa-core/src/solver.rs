//! solver.rs — Iterative least-squares minimiser over a 2D position
//!
//! Default algorithm: finite-difference gradient descent minimising
//!   L(x, y) = Σ r_i(x, y)²
//! with a fixed learning rate and forward differences:
//!   g_x = (L(x+δ, y) − L(x, y)) / δ,   g_y = (L(x, y+δ) − L(x, y)) / δ
//!
//! Stops when |L_prev − L| < tolerance or after max_iterations. The result is
//! always returned; the iteration count tells the caller how it ended.
//! No line search and no adaptive step: a learning rate that is too large
//! diverges, and that is observable through `solve_with_observer`.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tdoa_types::Point2D;
use tracing::debug;

use crate::error::ConfigError;
use crate::gauss_newton;
use crate::loss::loss_at;
use crate::model::ResidualModel;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    #[default]
    GradientDescent,
    /// Same contract, 2×2 normal equations per step
    GaussNewton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    /// Gradient descent step multiplier (default 0.01)
    pub learning_rate: f64,
    /// Hard iteration cap (default 10000)
    pub max_iterations: u32,
    /// Stop when the loss changes by less than this (default 1e-12)
    pub tolerance: f64,
    /// Forward-difference step δ (default 1e-6)
    pub finite_difference_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::GradientDescent,
            learning_rate: 0.01,
            max_iterations: 10_000,
            tolerance: 1e-12,
            finite_difference_step: 1e-6,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidSolverParameter {
                name: "learning_rate",
                value: self.learning_rate,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSolverParameter { name: "max_iterations", value: 0.0 });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::InvalidSolverParameter {
                name: "tolerance",
                value: self.tolerance,
            });
        }
        if !(self.finite_difference_step.is_finite() && self.finite_difference_step > 0.0) {
            return Err(ConfigError::InvalidSolverParameter {
                name: "finite_difference_step",
                value: self.finite_difference_step,
            });
        }
        Ok(())
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Loss change fell under the tolerance
    Converged,
    /// max_iterations reached
    IterationCap,
    /// Observer asked to stop
    Cancelled,
    /// Gauss-Newton normal matrix could not be inverted
    Singular,
}

/// Solver output for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    /// Update steps taken. `< max_iterations` on tolerance convergence,
    /// `== max_iterations` when the cap was hit.
    pub iterations: u32,
    /// Loss at the returned position
    pub loss: f64,
    pub stop: StopReason,
}

impl PositionEstimate {
    pub fn position(&self) -> Point2D { Point2D::new(self.x, self.y) }

    pub fn converged(&self) -> bool { self.stop == StopReason::Converged }
}

/// Reported to the observer after every loss evaluation, before the
/// convergence check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    pub iteration: u32,
    pub x: f64,
    pub y: f64,
    pub loss: f64,
}

// ── Entry points ──────────────────────────────────────────────────────────────

pub fn solve<M: ResidualModel + ?Sized>(
    model: &M,
    initial_guess: Point2D,
    config: &SolverConfig,
) -> PositionEstimate {
    solve_with_observer(model, initial_guess, config, |_| ControlFlow::Continue(()))
}

/// Like [`solve`], calling `observer` once per iteration. Returning
/// `ControlFlow::Break(())` stops the solve at the current position.
pub fn solve_with_observer<M, F>(
    model: &M,
    initial_guess: Point2D,
    config: &SolverConfig,
    observer: F,
) -> PositionEstimate
where
    M: ResidualModel + ?Sized,
    F: FnMut(&IterationReport) -> ControlFlow<()>,
{
    let estimate = match config.method {
        SolverMethod::GradientDescent => gradient_descent(model, initial_guess, config, observer),
        SolverMethod::GaussNewton => gauss_newton::solve(model, initial_guess, config, observer),
    };
    debug!(
        "solve {:?}: ({:.3}, {:.3}) after {} iterations, loss={:.3e}, stop={:?}",
        config.method, estimate.x, estimate.y, estimate.iterations, estimate.loss, estimate.stop
    );
    estimate
}

fn gradient_descent<M, F>(
    model: &M,
    initial_guess: Point2D,
    config: &SolverConfig,
    mut observer: F,
) -> PositionEstimate
where
    M: ResidualModel + ?Sized,
    F: FnMut(&IterationReport) -> ControlFlow<()>,
{
    let (mut x, mut y) = (initial_guess.x, initial_guess.y);
    let delta = config.finite_difference_step;
    let lr = config.learning_rate;

    let mut iteration = 0u32;
    let mut previous_loss = f64::INFINITY;
    let mut stop = StopReason::IterationCap;

    while iteration < config.max_iterations {
        let loss = loss_at(model, Point2D::new(x, y));

        if observer(&IterationReport { iteration, x, y, loss }).is_break() {
            stop = StopReason::Cancelled;
            break;
        }

        if (previous_loss - loss).abs() < config.tolerance {
            stop = StopReason::Converged;
            break;
        }
        previous_loss = loss;

        let grad_x = (loss_at(model, Point2D::new(x + delta, y)) - loss) / delta;
        let grad_y = (loss_at(model, Point2D::new(x, y + delta)) - loss) / delta;

        x -= lr * grad_x;
        y -= lr * grad_y;

        iteration += 1;
    }

    PositionEstimate {
        x,
        y,
        iterations: iteration,
        loss: loss_at(model, Point2D::new(x, y)),
        stop,
    }
}
