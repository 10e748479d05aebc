use serde::Serialize;
use std::sync::Arc;
use tdoa_types::PositionUpdate;
use tokio::sync::RwLock;

// ─── Hub Counters ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Station reports accepted by the aggregator
    pub ingested: u64,
    /// Reports rejected as invalid or undecodable, plus completed groups the
    /// estimator refused
    pub rejected: u64,
    /// Groups that reached all stations
    pub completed: u64,
    /// Incomplete groups pushed out by the pending-group cap
    pub evicted: u64,
    /// Completed groups dropped because the solve queue was full
    pub dropped: u64,
    pub solved: u64,
    /// Solves that hit the iteration cap
    pub non_converged: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_estimate: Option<PositionUpdate>,
}

impl HubStats {
    pub fn record_solve(&mut self, update: &PositionUpdate) {
        self.solved += 1;
        if !update.converged {
            self.non_converged += 1;
        }
        self.last_estimate = Some(update.clone());
    }
}

pub type SharedStats = Arc<RwLock<HubStats>>;
