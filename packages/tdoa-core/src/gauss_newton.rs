//! gauss_newton.rs — Gauss-Newton alternative to gradient descent
//!
//! Each iteration linearises the residuals around the current estimate with a
//! forward-difference Jacobian and solves the 2×2 normal equations
//!   JᵀJ · δp = −Jᵀr
//! by Cramer's rule. Stopping rules match gradient descent (loss change under
//! tolerance, or the iteration cap), so callers see the same contract.

use std::ops::ControlFlow;

use tdoa_types::Point2D;
use tracing::trace;

use crate::loss::sum_of_squares;
use crate::model::ResidualModel;
use crate::solver::{IterationReport, PositionEstimate, SolverConfig, StopReason};

/// Normal matrix determinant below this is treated as singular
const SINGULAR_DET: f64 = 1e-10;

pub(crate) fn solve<M, F>(
    model: &M,
    initial_guess: Point2D,
    config: &SolverConfig,
    mut observer: F,
) -> PositionEstimate
where
    M: ResidualModel + ?Sized,
    F: FnMut(&IterationReport) -> ControlFlow<()>,
{
    let mut p = initial_guess;
    let delta = config.finite_difference_step;

    let mut iteration = 0u32;
    let mut previous_loss = f64::INFINITY;
    let mut stop = StopReason::IterationCap;

    while iteration < config.max_iterations {
        let r = model.residuals(p);
        let loss = sum_of_squares(&r);

        if observer(&IterationReport { iteration, x: p.x, y: p.y, loss }).is_break() {
            stop = StopReason::Cancelled;
            break;
        }

        if (previous_loss - loss).abs() < config.tolerance {
            stop = StopReason::Converged;
            break;
        }
        previous_loss = loss;

        // Jacobian columns by forward differences
        let rx = model.residuals(Point2D::new(p.x + delta, p.y));
        let ry = model.residuals(Point2D::new(p.x, p.y + delta));

        let mut jtj = [[0.0f64; 2]; 2];
        let mut jtr = [0.0f64; 2];
        for i in 0..r.len() {
            let jx = (rx[i] - r[i]) / delta;
            let jy = (ry[i] - r[i]) / delta;
            jtj[0][0] += jx * jx;
            jtj[0][1] += jx * jy;
            jtj[1][0] += jy * jx;
            jtj[1][1] += jy * jy;
            jtr[0] += jx * r[i];
            jtr[1] += jy * r[i];
        }

        let det = jtj[0][0] * jtj[1][1] - jtj[0][1] * jtj[1][0];
        if det.abs() < SINGULAR_DET {
            trace!("gauss-newton: singular normal matrix (det={det:.3e}) at iteration {iteration}");
            stop = StopReason::Singular;
            break;
        }
        let dx = -(jtj[1][1] * jtr[0] - jtj[0][1] * jtr[1]) / det;
        let dy = -(jtj[0][0] * jtr[1] - jtj[1][0] * jtr[0]) / det;

        p = Point2D::new(p.x + dx, p.y + dy);
        iteration += 1;
    }

    PositionEstimate {
        x: p.x,
        y: p.y,
        iterations: iteration,
        loss: sum_of_squares(&model.residuals(p)),
        stop,
    }
}
