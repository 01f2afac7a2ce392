//! Connecting side of the handshake.

use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use log::{debug, info};

use super::wire::{Announcement, AnnouncementError, MAX_ANNOUNCEMENT_LEN, decode_announcement};
use crate::error::{Result, SimError};

/// A connected client waiting for the peer's announcement.
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Connect to a listening peer. Blocks the caller; not retried on failure.
    pub fn connect(address: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", address, port);
        let connect_failed = |source| SimError::ConnectFailed { addr: addr.clone(), source };

        let stream = TcpStream::connect((address, port)).map_err(connect_failed)?;
        let peer_addr = stream.peer_addr().map_err(connect_failed)?;
        info!("Connected to {}", peer_addr);
        Ok(Self { stream, peer_addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Bound the wait in [`Connection::receive`]. `None` (the default) waits indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|e| SimError::InvalidConfig(format!("read timeout {:?} rejected: {}", timeout, e)))
    }

    /// Read the announcement until the peer closes, then close this side.
    ///
    /// # Returns
    ///
    /// * `Err(SimError::PeerClosedEarly)` if the connection dropped before a
    ///   complete announcement arrived (including a truncated message)
    /// * `Err(SimError::MalformedAnnouncement)` if the message is not UTF-8,
    ///   has an empty id, or exceeds the size limit
    pub fn receive(self) -> Result<Announcement> {
        let peer = self.peer_addr.to_string();
        let mut payload = Vec::with_capacity(64);

        let read = (&self.stream).take(MAX_ANNOUNCEMENT_LEN as u64 + 1).read_to_end(&mut payload);
        self.close();

        if let Err(e) = read {
            return Err(SimError::PeerClosedEarly {
                addr: peer,
                reason: format!("read failed after {} bytes: {}", payload.len(), e),
            });
        }
        if payload.len() > MAX_ANNOUNCEMENT_LEN {
            return Err(SimError::MalformedAnnouncement {
                addr: peer,
                detail: format!("message longer than {} bytes", MAX_ANNOUNCEMENT_LEN),
            });
        }

        match decode_announcement(&payload) {
            Ok(announcement) => {
                info!("Message from server: {}", announcement.message);
                Ok(announcement)
            }
            Err(AnnouncementError::Empty) => Err(SimError::PeerClosedEarly {
                addr: peer,
                reason: "closed without sending an announcement".to_string(),
            }),
            Err(AnnouncementError::Truncated) => Err(SimError::PeerClosedEarly {
                addr: peer,
                reason: format!("announcement truncated after {} bytes", payload.len()),
            }),
            Err(AnnouncementError::Malformed(detail)) => Err(SimError::MalformedAnnouncement { addr: peer, detail }),
        }
    }

    fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of connection to {} reported: {}", self.peer_addr, e);
        }
    }
}
