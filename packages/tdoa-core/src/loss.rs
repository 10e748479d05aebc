//! Scalar loss over a residual vector.

use tdoa_types::Point2D;

use crate::model::ResidualModel;

/// Σ r_i²
pub fn sum_of_squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Loss of `model` at `p`
pub fn loss_at<M: ResidualModel + ?Sized>(model: &M, p: Point2D) -> f64 {
    sum_of_squares(&model.residuals(p))
}
