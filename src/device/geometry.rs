//! Geometry helpers for device positions.
//!
//! Positions are unbounded real coordinates in world units (meters). Distance
//! is computed with chained `hypot` calls so large coordinates do not overflow
//! the intermediate squares.

use serde::Deserialize;
use std::fmt;

/// A point in 3D world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Return this point shifted by the given deltas.
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Euclidean distance between two points.
///
/// Symmetric by construction: each component difference only enters through
/// its absolute value.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx.hypot(dy).hypot(dz)
}
