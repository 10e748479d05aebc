//! # tdoa_hub
//!
//! Ingest side of the hub. Receives station reports over UDP, validates
//! them, groups them per emission and hands completed groups to the solve
//! worker.
//!
//! ## Architecture
//! Runs as a single Tokio task that owns the `MeasurementAggregator`, so
//! reports are processed strictly one at a time and the aggregator needs no
//! lock. Completed groups go out over a bounded channel with `try_send`:
//! a slow solve never blocks ingestion; when the queue is full the group is
//! dropped and counted.
//!
//! UDP errors and bad datagrams are logged and never stop the loop.

use std::net::SocketAddr;

use tdoa_core::{CompletedGroup, Ingest, InvalidMeasurement, MeasurementAggregator};
use tdoa_types::MeasurementReport;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::state::SharedStats;

/// Largest datagram we accept; a report is well under 200 bytes
const MAX_DATAGRAM: usize = 4096;

pub fn decode_report(data: &[u8]) -> Result<MeasurementReport, InvalidMeasurement> {
    serde_json::from_slice(data).map_err(|e| InvalidMeasurement::Malformed(e.to_string()))
}

/// Decode and aggregate one datagram.
pub fn ingest_datagram(
    data: &[u8],
    aggregator: &mut MeasurementAggregator,
) -> Result<Ingest, InvalidMeasurement> {
    let report = decode_report(data)?;
    aggregator.ingest(&report)
}

/// Bind the UDP socket and run the ingest loop until the process exits.
pub async fn start_tdoa_hub(
    udp_port: u16,
    aggregator: MeasurementAggregator,
    stats: SharedStats,
    solve_tx: mpsc::Sender<CompletedGroup>,
) {
    let addr = format!("0.0.0.0:{udp_port}");
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 TDOA hub listening on UDP {addr}");
            s
        }
        Err(e) => {
            error!("TDOA hub: could not bind UDP {addr}: {e}; no measurements will be received");
            return;
        }
    };
    run_ingest(socket, aggregator, stats, solve_tx).await;
}

pub async fn run_ingest(
    socket: UdpSocket,
    mut aggregator: MeasurementAggregator,
    stats: SharedStats,
    solve_tx: mpsc::Sender<CompletedGroup>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                process_datagram(&buf[..len], src, &mut aggregator, &stats, &solve_tx).await;
            }
            Err(e) => {
                warn!("TDOA hub: UDP recv error: {e}");
            }
        }
    }
}

async fn process_datagram(
    data: &[u8],
    src: SocketAddr,
    aggregator: &mut MeasurementAggregator,
    stats: &SharedStats,
    solve_tx: &mpsc::Sender<CompletedGroup>,
) {
    let outcome = match ingest_datagram(data, aggregator) {
        Ok(o) => o,
        Err(e) => {
            debug!("TDOA hub: rejected datagram from {src}: {e}");
            stats.write().await.rejected += 1;
            return;
        }
    };

    let mut s = stats.write().await;
    s.ingested += 1;
    s.evicted += aggregator.take_evicted();
    if let Ingest::Completed(group) = outcome {
        s.completed += 1;
        let id = group.id().to_string();
        match solve_tx.try_send(group) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                s.dropped += 1;
                warn!("TDOA hub: solve queue full, dropping measurement {id}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("TDOA hub: solve worker gone, dropping measurement {id}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tdoa_core::{AggregatorConfig, StationLayout};
    use tokio::sync::RwLock;

    use crate::state::HubStats;

    fn aggregator() -> MeasurementAggregator {
        MeasurementAggregator::new(StationLayout::default(), AggregatorConfig::default())
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut agg = aggregator();
        let err = ingest_datagram(b"{not json", &mut agg).unwrap_err();
        assert!(matches!(err, InvalidMeasurement::Malformed(_)));

        let err = ingest_datagram(br#"{"id":"1","sourceId":"station1","receivedAt":"x"}"#, &mut agg)
            .unwrap_err();
        assert!(matches!(err, InvalidMeasurement::Malformed(_)));
        assert_eq!(agg.pending_len(), 0);
    }

    #[test]
    fn datagrams_complete_a_group() {
        let mut agg = aggregator();
        for (src, t) in [("station3", 3.0), ("station1", 1.0)] {
            let raw = format!(r#"{{"id":"7","sourceId":"{src}","receivedAt":{t}}}"#);
            assert!(matches!(ingest_datagram(raw.as_bytes(), &mut agg), Ok(Ingest::Pending { .. })));
        }
        let raw = br#"{"id":"7","sourceId":"station2","receivedAt":2.0}"#;
        match ingest_datagram(raw, &mut agg).unwrap() {
            Ingest::Completed(g) => assert_eq!(g.arrivals(), [1.0, 2.0, 3.0]),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn udp_reports_reach_the_solve_queue() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(run_ingest(socket, aggregator(), stats.clone(), tx));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for datagram in [
            r#"{"id":"a","sourceId":"station2","receivedAt":2.0}"#,
            r#"{"id":"a","sourceId":"station9","receivedAt":2.0}"#,
            r#"{"id":"a","sourceId":"station1","receivedAt":1.0}"#,
            r#"{"id":"a","sourceId":"station3","receivedAt":3.0}"#,
        ] {
            sender.send_to(datagram.as_bytes(), addr).await.unwrap();
        }

        let group = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for group")
            .expect("channel closed");
        assert_eq!(group.id(), "a");
        assert_eq!(group.arrivals(), [1.0, 2.0, 3.0]);

        let s = stats.read().await;
        assert_eq!(s.ingested, 3);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.completed, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
        let (tx, _rx) = mpsc::channel(1);
        let mut agg = aggregator();
        let src: SocketAddr = "127.0.0.1:9".parse().unwrap();

        for id in ["a", "b"] {
            for (station, t) in [("station1", 1.0), ("station2", 2.0), ("station3", 3.0)] {
                let raw = format!(r#"{{"id":"{id}","sourceId":"{station}","receivedAt":{t}}}"#);
                process_datagram(raw.as_bytes(), src, &mut agg, &stats, &tx).await;
            }
        }

        let s = stats.read().await;
        assert_eq!(s.completed, 2);
        assert_eq!(s.dropped, 1);
    }

    #[tokio::test]
    async fn evictions_are_counted() {
        let stats: SharedStats = Arc::new(RwLock::new(HubStats::default()));
        let (tx, _rx) = mpsc::channel(4);
        let mut agg = MeasurementAggregator::new(
            StationLayout::default(),
            AggregatorConfig { max_pending_groups: 2 },
        );
        let src: SocketAddr = "127.0.0.1:9".parse().unwrap();

        // station3 never reports, so every id stays pending
        for id in ["a", "b", "c", "d"] {
            let raw = format!(r#"{{"id":"{id}","sourceId":"station1","receivedAt":1.0}}"#);
            process_datagram(raw.as_bytes(), src, &mut agg, &stats, &tx).await;
        }

        let s = stats.read().await;
        assert_eq!(s.ingested, 4);
        assert_eq!(s.evicted, 2);
        assert_eq!(agg.pending_len(), 2);
    }
}
