//! One-shot TCP handshake demonstrating transport-level connectivity.
//!
//! The listening side accepts a single connection, announces the device
//! identity and closes. The connecting side reads the announcement until EOF
//! and closes. The exchange is push-only and independent of the geometric
//! reachability check.
//!
//! ## Module Organization
//!
//! - `wire`: announcement encoding and validation
//! - `listener`: server states (`Listener` → `AcceptedPeer`) and the background accept worker
//! - `client`: client state (`Connection`)
//!
//! Every state transition consumes its value, so a socket that has been
//! closed can never be used again. A new handshake needs a fresh `Listener`.

pub mod client;
pub mod listener;
pub mod wire;

pub use client::Connection;
pub use listener::{AcceptedPeer, CancelHandle, HandshakeReport, Listener, ListenerHandle};
pub use wire::Announcement;

/// Well-known handshake port.
pub const DEFAULT_PORT: u16 = 12345;
