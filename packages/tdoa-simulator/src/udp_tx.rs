//! udp_tx.rs — UDP transmitter for station reports
//!
//! One datagram per report, JSON encoded exactly as the hub decodes it
//! (`tdoa_types::MeasurementReport`, camelCase keys).
//! Send errors are logged and never stop the sim loop.

use std::net::UdpSocket;
use tracing::{debug, warn};

use crate::signal_physics::Emission;

pub struct UdpTransmitter {
    socket: UdpSocket,
    hub_addr: String,
}

impl UdpTransmitter {
    pub fn new(hub_addr: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(false)?;
        Ok(Self { socket, hub_addr: hub_addr.to_string() })
    }

    /// Send every surviving report of one emission
    pub fn send_emission(&self, emission: &Emission) {
        for report in &emission.reports {
            let bytes = match serde_json::to_vec(report) {
                Ok(b) => b,
                Err(e) => { warn!("UDP: serialize failed: {e}"); continue; }
            };

            if let Err(e) = self.socket.send_to(&bytes, &self.hub_addr) {
                warn!("UDP: send to {} failed: {e}", self.hub_addr);
            } else {
                debug!("UDP → {} id={} source={}", self.hub_addr, report.id, report.source_id);
            }
        }
    }
}
