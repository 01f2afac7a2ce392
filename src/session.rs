//! Two-device simulation session driven by the presentation layer.
//!
//! A session owns the local device and its single peer for its whole
//! lifetime. The presentation layer hands in raw text fields, calls
//! `start`/`move_local`, and renders the returned `StatusReport`.

use std::fmt;
use std::sync::mpsc::Sender;

use crate::device::{Device, PositionUpdate, ReachabilityResult};
use crate::error::{Result, SimError};

/// Offset applied on every axis when the peer is derived from the local device.
pub const PEER_OFFSET: f64 = 10.0;

/// Which status line a report renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPhase {
    Initial,
    AfterMove,
}

/// Reachability of the peer from the local device, ready to display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub phase: ReportPhase,
    pub result: ReachabilityResult,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.result.reachable { "can" } else { "cannot" };
        let prefix = match self.phase {
            ReportPhase::Initial => "Devices",
            ReportPhase::AfterMove => "After moving, devices",
        };
        write!(f, "{} {} communicate. Distance: {:.2} meters.", prefix, verdict, self.result.distance)
    }
}

pub struct Session {
    local: Device,
    peer: Device,
}

impl Session {
    /// Start a session with a peer placed `PEER_OFFSET` away on every axis,
    /// sharing the local device's range.
    pub fn start(local: Device, peer_id: impl Into<String>) -> Result<Self> {
        let origin = local.position();
        let peer = Device::create(
            peer_id,
            origin.x + PEER_OFFSET,
            origin.y + PEER_OFFSET,
            origin.z + PEER_OFFSET,
            local.range(),
        )?;
        Self::with_peer(local, peer)
    }

    /// Start a session with an explicitly placed peer.
    pub fn with_peer(local: Device, peer: Device) -> Result<Self> {
        if local.id() == peer.id() {
            return Err(SimError::InvalidConfig(format!("peer id {:?} duplicates the local device", peer.id())));
        }
        let session = Self { local, peer };
        log::debug!("Session started: {} -> {}", session.local.id(), session.peer.id());
        Ok(session)
    }

    pub fn local(&self) -> &Device {
        &self.local
    }

    pub fn peer(&self) -> &Device {
        &self.peer
    }

    /// Forward position updates of the local device to `observer`.
    pub fn attach_observer(&mut self, observer: Sender<PositionUpdate>) {
        self.local.attach_observer(observer);
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            phase: ReportPhase::Initial,
            result: self.local.can_communicate(&self.peer),
        }
    }

    /// Relocate the local device and re-evaluate reachability.
    pub fn move_local(&mut self, dx: f64, dy: f64, dz: f64) -> StatusReport {
        self.local.relocate(dx, dy, dz);
        StatusReport {
            phase: ReportPhase::AfterMove,
            result: self.local.can_communicate(&self.peer),
        }
    }
}

/// Build a device from raw user-entered text fields.
pub fn parse_device(id: &str, x: &str, y: &str, z: &str, range: &str) -> Result<Device> {
    let id = id.trim();
    if id.is_empty() {
        return Err(SimError::InvalidConfig("device id must not be empty".to_string()));
    }
    Device::create(
        id,
        parse_field("x", x)?,
        parse_field("y", y)?,
        parse_field("z", z)?,
        parse_field("range", range)?,
    )
}

/// Parse relocation deltas from raw text fields.
pub fn parse_deltas(dx: &str, dy: &str, dz: &str) -> Result<(f64, f64, f64)> {
    Ok((parse_field("dx", dx)?, parse_field("dy", dy)?, parse_field("dz", dz)?))
}

fn parse_field(name: &str, text: &str) -> Result<f64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| SimError::InvalidConfig(format!("{} must be a number, got {:?}", name, text)))?;
    if !value.is_finite() {
        return Err(SimError::InvalidConfig(format!("{} must be finite, got {:?}", name, text)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Position;
    use std::sync::mpsc;

    #[test]
    fn peer_is_offset_with_shared_range() {
        let local = Device::create("A", 1.0, 2.0, 3.0, 20.0).unwrap();
        let session = Session::start(local, "B").unwrap();

        assert_eq!(session.peer().position(), Position::new(11.0, 12.0, 13.0));
        assert_eq!(session.peer().range(), 20.0);
        // sqrt(300) = 17.32
        let report = session.status();
        assert!(report.result.reachable);
        assert_eq!(report.to_string(), "Devices can communicate. Distance: 17.32 meters.");
    }

    #[test]
    fn moving_reports_with_after_prefix() {
        let local = Device::create("A", 0.0, 0.0, 0.0, 10.0).unwrap();
        let peer = Device::create("B", 3.0, 4.0, 0.0, 10.0).unwrap();
        let mut session = Session::with_peer(local, peer).unwrap();
        assert_eq!(session.status().to_string(), "Devices can communicate. Distance: 5.00 meters.");

        let report = session.move_local(10.0, 10.0, 10.0);
        assert_eq!(report.phase, ReportPhase::AfterMove);
        assert!(!report.result.reachable);
        assert_eq!(report.to_string(), "After moving, devices cannot communicate. Distance: 13.60 meters.");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let local = Device::create("A", 0.0, 0.0, 0.0, 1.0).unwrap();
        assert!(matches!(Session::start(local, "A"), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn observer_sees_local_moves() {
        let (tx, rx) = mpsc::channel();
        let local = Device::create("A", 0.0, 0.0, 0.0, 1.0).unwrap();
        let mut session = Session::start(local, "B").unwrap();
        session.attach_observer(tx);

        session.move_local(1.0, 1.0, 1.0);
        assert_eq!(rx.try_recv().unwrap().position, Position::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn parse_device_accepts_numeric_text() {
        let device = parse_device(" A ", "1", "-2.5", " 3e1 ", "10").unwrap();
        assert_eq!(device.id(), "A");
        assert_eq!(device.position(), Position::new(1.0, -2.5, 30.0));
        assert_eq!(device.range(), 10.0);
    }

    #[test]
    fn parse_device_rejects_bad_input() {
        assert!(matches!(parse_device("A", "one", "0", "0", "1"), Err(SimError::InvalidConfig(_))));
        assert!(matches!(parse_device("A", "0", "0", "0", "-1"), Err(SimError::InvalidConfig(_))));
        assert!(matches!(parse_device("A", "0", "0", "NaN", "1"), Err(SimError::InvalidConfig(_))));
        assert!(matches!(parse_device("  ", "0", "0", "0", "1"), Err(SimError::InvalidConfig(_))));
        assert!(matches!(parse_deltas("1", "", "2"), Err(SimError::InvalidConfig(_))));
        assert_eq!(parse_deltas("1", "-1", "0.5").unwrap(), (1.0, -1.0, 0.5));
    }
}
