//! Per-device state and pairwise reachability queries.

use chrono::{DateTime, Utc};
use std::sync::mpsc::Sender;

use super::geometry::{Position, distance};
use crate::error::{Result, SimError};

/// Notification emitted after every relocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub device_id: String,
    pub position: Position,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of comparing two devices. Recomputed on every query, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachabilityResult {
    /// Euclidean separation between the two positions.
    pub distance: f64,
    /// True iff `distance` is within the querying device's range.
    pub reachable: bool,
}

/// A simulated network node.
///
/// `range` is the detection radius: the farthest distance at which this
/// device can detect another one. It never limits how far the device moves.
#[derive(Debug, Clone)]
pub struct Device {
    id: String,
    position: Position,
    range: f64,
    observer: Option<Sender<PositionUpdate>>,
}

impl Device {
    /// Create a device at `(x, y, z)` with the given detection radius.
    ///
    /// # Returns
    ///
    /// `Err(SimError::InvalidConfig)` if `range` is negative or any value is
    /// not a finite number. No device is constructed in that case.
    pub fn create(id: impl Into<String>, x: f64, y: f64, z: f64, range: f64) -> Result<Self> {
        let id = id.into();
        let position = Position::new(x, y, z);
        if !position.is_finite() {
            return Err(SimError::InvalidConfig(format!("device {} position {} is not finite", id, position)));
        }
        if !range.is_finite() || range < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "device {} range {} must be a finite non-negative number",
                id, range
            )));
        }
        Ok(Self {
            id,
            position,
            range,
            observer: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Attach a telemetry observer that receives a `PositionUpdate` after each move.
    ///
    /// Delivery is fire-and-forget: a dropped receiver is silently ignored.
    pub fn attach_observer(&mut self, observer: Sender<PositionUpdate>) {
        self.observer = Some(observer);
    }

    /// Move the device by the given deltas. Unbounded; always succeeds.
    pub fn relocate(&mut self, dx: f64, dy: f64, dz: f64) -> Position {
        self.position = self.position.offset(dx, dy, dz);
        log::info!("Device {} moved to {}", self.id, self.position);

        if let Some(observer) = &self.observer {
            let update = PositionUpdate {
                device_id: self.id.clone(),
                position: self.position,
                timestamp: Utc::now(),
            };
            if observer.send(update).is_err() {
                log::debug!("Position observer for {} is gone", self.id);
            }
        }
        self.position
    }

    pub fn distance_to(&self, other: &Device) -> f64 {
        distance(&self.position, &other.position)
    }

    /// Check whether `other` lies within this device's range.
    ///
    /// Asymmetric: only `self.range` is consulted, so `a.can_communicate(&b)`
    /// and `b.can_communicate(&a)` differ when the ranges differ.
    pub fn can_communicate(&self, other: &Device) -> ReachabilityResult {
        let distance = self.distance_to(other);
        ReachabilityResult {
            distance,
            reachable: distance <= self.range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn device(id: &str, x: f64, y: f64, z: f64, range: f64) -> Device {
        Device::create(id, x, y, z, range).unwrap()
    }

    #[test]
    fn create_rejects_negative_range() {
        let err = Device::create("a", 0.0, 0.0, 0.0, -1.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    #[test]
    fn create_rejects_non_finite_values() {
        assert!(matches!(Device::create("a", f64::NAN, 0.0, 0.0, 1.0), Err(SimError::InvalidConfig(_))));
        assert!(matches!(Device::create("a", 0.0, 0.0, 0.0, f64::INFINITY), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn zero_range_only_reaches_same_position() {
        let a = device("a", 1.0, 1.0, 1.0, 0.0);
        let b = device("b", 1.0, 1.0, 1.0, 0.0);
        let c = device("c", 1.0, 1.0, 1.5, 0.0);
        assert!(a.can_communicate(&b).reachable);
        assert!(!a.can_communicate(&c).reachable);
    }

    #[test]
    fn reachability_uses_callers_range() {
        let a = device("A", 0.0, 0.0, 0.0, 5.0);
        let b = device("B", 10.0, 0.0, 0.0, 50.0);

        let ab = a.can_communicate(&b);
        let ba = b.can_communicate(&a);
        assert_eq!(ab.distance, 10.0);
        assert!(!ab.reachable);
        assert_eq!(ba.distance, 10.0);
        assert!(ba.reachable);
        assert_eq!(a.distance_to(&b), b.distance_to(&a));
    }

    #[test]
    fn relocation_flips_reachability() {
        let mut a = device("A", 0.0, 0.0, 0.0, 10.0);
        let b = device("B", 3.0, 4.0, 0.0, 10.0);

        assert_eq!(a.distance_to(&b), 5.0);
        assert!(a.can_communicate(&b).reachable);

        let moved = a.relocate(10.0, 10.0, 10.0);
        assert_eq!(moved, Position::new(10.0, 10.0, 10.0));
        assert_eq!(a.position(), moved);

        let result = a.can_communicate(&b);
        assert!((result.distance - 185f64.sqrt()).abs() < 1e-12);
        assert!(!result.reachable);
    }

    #[test]
    fn boundary_distance_is_reachable() {
        let a = device("A", 0.0, 0.0, 0.0, 5.0);
        let b = device("B", 3.0, 4.0, 0.0, 1.0);
        assert!(a.can_communicate(&b).reachable);
    }

    #[test]
    fn relocation_notifies_observer() {
        let (tx, rx) = mpsc::channel();
        let mut a = device("A", 1.0, 2.0, 3.0, 1.0);
        a.attach_observer(tx);

        a.relocate(-1.0, -2.0, -3.0);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.device_id, "A");
        assert_eq!(update.position, Position::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn relocation_ignores_dropped_observer() {
        let (tx, rx) = mpsc::channel();
        let mut a = device("A", 0.0, 0.0, 0.0, 1.0);
        a.attach_observer(tx);
        drop(rx);

        assert_eq!(a.relocate(1.0, 0.0, 0.0), Position::new(1.0, 0.0, 0.0));
    }
}
