//! Error taxonomy shared by the device model and the handshake channel.
//!
//! Geometry problems surface as `InvalidConfig` at construction time. Every
//! networking failure keeps its address and the underlying `io::Error` so the
//! caller can inspect it and decide whether to retry.

use std::io;

/// Errors raised by the simulator core.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Bad construction parameters (negative range, non-numeric input, bad config value).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listening address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// No listener was reachable at the peer address.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The connection dropped before the announcement was fully sent or received.
    #[error("peer {addr} closed the connection early: {reason}")]
    PeerClosedEarly { addr: String, reason: String },

    /// A complete message arrived but it is not a valid announcement.
    #[error("malformed announcement from {addr}: {detail}")]
    MalformedAnnouncement { addr: String, detail: String },

    /// The background accept worker could not be started.
    #[error("failed to start accept worker for {addr}: {source}")]
    WorkerSpawnFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The channel was cancelled or already exhausted.
    #[error("handshake channel closed")]
    ChannelClosed,
}

impl SimError {
    /// Kind of the underlying socket error, if this failure wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            SimError::BindFailed { source, .. }
            | SimError::ConnectFailed { source, .. }
            | SimError::WorkerSpawnFailed { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kind_only_for_socket_errors() {
        let refused = SimError::ConnectFailed {
            addr: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.io_kind(), Some(io::ErrorKind::ConnectionRefused));
        assert_eq!(SimError::ChannelClosed.io_kind(), None);
    }

    #[test]
    fn worker_spawn_failure_keeps_os_error() {
        let err = SimError::WorkerSpawnFailed {
            addr: "127.0.0.1:12345".into(),
            source: io::Error::from(io::ErrorKind::WouldBlock),
        };
        assert_eq!(err.io_kind(), Some(io::ErrorKind::WouldBlock));
        assert!(err.to_string().starts_with("failed to start accept worker for 127.0.0.1:12345"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_includes_address() {
        let err = SimError::PeerClosedEarly {
            addr: "127.0.0.1:12345".into(),
            reason: "no data".into(),
        };
        assert_eq!(err.to_string(), "peer 127.0.0.1:12345 closed the connection early: no data");
    }
}
