//! aggregator.rs — Groups station reports by emission id
//!
//! A group is complete once every configured station has reported for its id,
//! in any order. A completed group is removed immediately, so the same id can
//! never complete twice and a later report for that id starts a fresh group.
//! A station reporting twice before completion overwrites its earlier value.
//!
//! Pending groups are capped; when a new id would exceed the cap the oldest
//! pending group is dropped (a station that stops reporting would otherwise
//! leak one group per emission).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tdoa_types::MeasurementReport;
use tracing::{debug, trace, warn};

use crate::error::InvalidMeasurement;
use crate::layout::StationLayout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Oldest pending group is evicted beyond this many (default 1024)
    pub max_pending_groups: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { max_pending_groups: 1024 }
    }
}

/// All arrival timestamps for one emission, in station layout order.
///
/// Only an aggregator builds these. The group remembers the station order it
/// was collected under so an estimator on a different layout can refuse it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGroup {
    id: String,
    arrivals: Vec<f64>,
    station_ids: Vec<String>,
}

impl CompletedGroup {
    pub(crate) fn new(id: impl Into<String>, layout: &StationLayout, arrivals: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            arrivals,
            station_ids: layout.stations().iter().map(|s| s.id.clone()).collect(),
        }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn arrivals(&self) -> &[f64] { &self.arrivals }

    /// Station ids matching `arrivals` one to one
    pub fn station_ids(&self) -> &[String] { &self.station_ids }

    /// True when the group was collected under exactly this station order
    pub fn matches(&self, layout: &StationLayout) -> bool {
        self.station_ids.len() == layout.len()
            && self.arrivals.len() == layout.len()
            && self.station_ids.iter().zip(layout.stations()).all(|(id, s)| *id == s.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    Completed(CompletedGroup),
    Pending { id: String, reported: usize, expected: usize },
}

struct PendingGroup {
    arrivals: Vec<Option<f64>>,
    /// Creation order, key into `by_age`
    seq: u64,
}

pub struct MeasurementAggregator {
    layout: StationLayout,
    config: AggregatorConfig,
    groups: HashMap<String, PendingGroup>,
    by_age: BTreeMap<u64, String>,
    next_seq: u64,
    /// Incomplete groups evicted since the last `take_evicted`
    evicted: u64,
}

impl MeasurementAggregator {
    pub fn new(layout: StationLayout, config: AggregatorConfig) -> Self {
        Self {
            layout,
            config,
            groups: HashMap::new(),
            by_age: BTreeMap::new(),
            next_seq: 0,
            evicted: 0,
        }
    }

    pub fn layout(&self) -> &StationLayout { &self.layout }

    /// Number of ids with at least one report and not yet complete
    pub fn pending_len(&self) -> usize { self.groups.len() }

    /// Arrivals recorded so far for `id`, in layout order
    pub fn pending(&self, id: &str) -> Option<&[Option<f64>]> {
        self.groups.get(id).map(|g| g.arrivals.as_slice())
    }

    /// Evictions since the previous call; resets the count.
    pub fn take_evicted(&mut self) -> u64 {
        std::mem::take(&mut self.evicted)
    }

    pub fn ingest(&mut self, report: &MeasurementReport) -> Result<Ingest, InvalidMeasurement> {
        let slot = self.validate(report)?;

        if !self.groups.contains_key(&report.id) {
            self.make_room();
        }

        let expected = self.layout.len();
        let group = self.groups.entry(report.id.clone()).or_insert_with(|| {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.by_age.insert(seq, report.id.clone());
            PendingGroup { arrivals: vec![None; expected], seq }
        });
        if let Some(previous) = group.arrivals[slot].replace(report.received_at) {
            trace!(
                "measurement {}: {} re-reported ({previous} → {})",
                report.id, report.source_id, report.received_at
            );
        }

        let reported = group.arrivals.iter().filter(|a| a.is_some()).count();
        if reported < expected {
            trace!("measurement {}: {reported}/{expected} stations", report.id);
            return Ok(Ingest::Pending { id: report.id.clone(), reported, expected });
        }
        let arrivals = group.arrivals.iter().flatten().copied().collect();

        if let Some(done) = self.groups.remove(&report.id) {
            self.by_age.remove(&done.seq);
        }
        debug!("measurement {} complete", report.id);
        Ok(Ingest::Completed(CompletedGroup::new(report.id.clone(), &self.layout, arrivals)))
    }

    /// Layout slot for a valid report
    fn validate(&self, report: &MeasurementReport) -> Result<usize, InvalidMeasurement> {
        if report.id.is_empty() {
            return Err(InvalidMeasurement::EmptyId);
        }
        let slot = self.layout.index_of(&report.source_id).ok_or_else(|| {
            InvalidMeasurement::UnknownSource {
                id: report.id.clone(),
                source_id: report.source_id.clone(),
            }
        })?;
        if !report.received_at.is_finite() {
            return Err(InvalidMeasurement::NonFiniteTimestamp {
                id: report.id.clone(),
                source_id: report.source_id.clone(),
                received_at: report.received_at,
            });
        }
        Ok(slot)
    }

    fn make_room(&mut self) {
        while self.groups.len() >= self.config.max_pending_groups.max(1) {
            let Some((_, oldest)) = self.by_age.pop_first() else { break };
            if let Some(group) = self.groups.remove(&oldest) {
                self.evicted += 1;
                let reported = group.arrivals.iter().filter(|a| a.is_some()).count();
                warn!(
                    "measurement {oldest}: evicted incomplete group ({reported}/{} stations)",
                    self.layout.len()
                );
            }
        }
    }
}
