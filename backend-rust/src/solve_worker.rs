//! Solve worker: completed groups in, position updates out.
//!
//! Each solve runs on the blocking pool so a slow (non-converging) group never
//! stalls the runtime. Groups are solved one at a time in arrival order.

use std::sync::Arc;

use tdoa_core::{CompletedGroup, InvalidMeasurement, PositionEstimator};
use tdoa_types::PositionUpdate;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::state::SharedStats;

pub fn to_update(
    estimator: &PositionEstimator,
    group: &CompletedGroup,
) -> Result<PositionUpdate, InvalidMeasurement> {
    let estimate = estimator.estimate(group)?;
    Ok(PositionUpdate {
        id: group.id().to_string(),
        x: estimate.x,
        y: estimate.y,
        iterations: estimate.iterations,
        converged: estimate.converged(),
    })
}

pub async fn run_solve_worker(
    estimator: Arc<PositionEstimator>,
    mut groups: mpsc::Receiver<CompletedGroup>,
    stats: SharedStats,
    updates: broadcast::Sender<PositionUpdate>,
) {
    info!("🧮 Solve worker running ({:?})", estimator.solver_config().method);

    while let Some(group) = groups.recv().await {
        let est = estimator.clone();
        let id = group.id().to_string();
        let update = match tokio::task::spawn_blocking(move || to_update(&est, &group)).await {
            Ok(Ok(u)) => u,
            Ok(Err(e)) => {
                warn!("Skipping measurement {id}: {e}");
                stats.write().await.rejected += 1;
                continue;
            }
            Err(e) => {
                error!("Solve for measurement {id} panicked: {e}");
                continue;
            }
        };

        stats.write().await.record_solve(&update);
        // No subscribers is fine; the update is still in stats
        let _ = updates.send(update);
    }

    info!("Solve worker stopped: ingest side closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdoa_core::{AggregatorConfig, EstimatorConfig, Ingest, MeasurementAggregator, StationLayout};
    use tdoa_types::{MeasurementReport, Point2D};
    use tokio::sync::RwLock;

    use crate::state::HubStats;

    /// Feed one emission through an aggregator on `layout`
    fn group_on(layout: StationLayout, truth: Point2D, id: &str) -> CompletedGroup {
        let mut agg = MeasurementAggregator::new(layout, AggregatorConfig::default());
        let reports: Vec<_> = agg.layout().stations().iter()
            // 0.3 m/ns = 3e5 m/ms
            .map(|s| MeasurementReport::new(id, s.id.clone(), 10.0 + s.distance_to(truth) / 3e5))
            .collect();
        reports.iter()
            .find_map(|r| match agg.ingest(r).unwrap() {
                Ingest::Completed(g) => Some(g),
                Ingest::Pending { .. } => None,
            })
            .unwrap()
    }

    fn group_for(truth: Point2D, id: &str) -> CompletedGroup {
        group_on(StationLayout::default(), truth, id)
    }

    #[test]
    fn update_carries_the_group_id() {
        let est = PositionEstimator::new(&EstimatorConfig::default()).unwrap();
        let u = to_update(&est, &group_for(Point2D::new(30_000.0, 40_000.0), "m-42")).unwrap();
        assert_eq!(u.id, "m-42");
        assert!(u.converged);
        assert!((u.x - 30_000.0).abs() < 1.0, "x = {}", u.x);
        assert!((u.y - 40_000.0).abs() < 1.0, "y = {}", u.y);
    }

    #[tokio::test]
    async fn worker_publishes_and_records() {
        let est = Arc::new(PositionEstimator::new(&EstimatorConfig::default()).unwrap());
        let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
        let (group_tx, group_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = broadcast::channel(4);

        let worker = tokio::spawn(run_solve_worker(est, group_rx, stats.clone(), update_tx));
        group_tx.send(group_for(Point2D::new(20_000.0, 20_000.0), "w1")).await.unwrap();
        drop(group_tx);

        let update = update_rx.recv().await.unwrap();
        assert_eq!(update.id, "w1");
        worker.await.unwrap();

        let s = stats.read().await;
        assert_eq!(s.solved, 1);
        assert_eq!(s.last_estimate.as_ref().map(|u| u.id.as_str()), Some("w1"));
    }

    #[tokio::test]
    async fn mismatched_group_is_skipped_not_published() {
        let est = Arc::new(PositionEstimator::new(&EstimatorConfig::default()).unwrap());
        let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
        let (group_tx, group_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = broadcast::channel(4);

        let mut stations = tdoa_types::default_stations();
        stations.rotate_left(1);
        let foreign = StationLayout::new(stations).unwrap();
        let truth = Point2D::new(20_000.0, 20_000.0);

        let worker = tokio::spawn(run_solve_worker(est, group_rx, stats.clone(), update_tx));
        group_tx.send(group_on(foreign, truth, "bad")).await.unwrap();
        group_tx.send(group_for(truth, "good")).await.unwrap();
        drop(group_tx);

        assert_eq!(update_rx.recv().await.unwrap().id, "good");
        worker.await.unwrap();

        let s = stats.read().await;
        assert_eq!(s.solved, 1);
        assert_eq!(s.rejected, 1);
    }
}
