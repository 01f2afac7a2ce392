//! Pairwise reachability of mobile devices in 3D space, plus a one-shot TCP
//! handshake that demonstrates transport-level connectivity.
//!
//! The geometric check and the handshake are independent: the handshake never
//! consults `Device::can_communicate`. Presentation layers drive both through
//! `session` (devices and status text) and `handshake` (listen/connect).

pub mod config;
pub mod device;
pub mod error;
pub mod handshake;
pub mod scene;
pub mod session;

pub use config::NetworkConfig;
pub use device::{Device, Position, PositionUpdate, ReachabilityResult};
pub use error::SimError;
pub use session::{Session, StatusReport};
