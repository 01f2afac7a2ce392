//! Device model: identity, 3D position and detection radius.
//!
//! ## Module Organization
//!
//! - `geometry`: 3D points and the Euclidean distance used by range checks
//! - `state`: the `Device` itself, relocation and pairwise reachability
//!
//! Reachability is evaluated from the querying device's point of view: A may
//! reach B while B cannot reach A when their ranges differ.

pub mod geometry;
pub mod state;

pub use geometry::Position;
pub use state::{Device, PositionUpdate, ReachabilityResult};
