//! Listening side of the handshake.
//!
//! `Listener::listen` binds, `Listener::accept` waits for exactly one peer and
//! drops the listening socket, `AcceptedPeer::announce` sends the identity and
//! closes. `Listener::spawn` runs the same sequence on a dedicated worker
//! thread and hands the outcome back over a channel.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::wire::encode_announcement;
use crate::error::{Result, SimError};

/// How long a cancel wake-up connection may take before we give up on it.
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// A bound, listening socket that will accept a single connection.
pub struct Listener {
    socket: TcpListener,
    local_addr: SocketAddr,
    cancelled: Arc<AtomicBool>,
}

impl Listener {
    /// Bind `address:port`. Port 0 picks a free port; see [`Listener::local_addr`].
    ///
    /// Failure is final for this attempt; nothing is retried.
    pub fn listen(address: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", address, port);
        let bind_failed = |source| SimError::BindFailed { addr: addr.clone(), source };

        let socket = TcpListener::bind((address, port)).map_err(bind_failed)?;
        let local_addr = socket.local_addr().map_err(bind_failed)?;
        debug!("Handshake listener bound on {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that can unblock [`Listener::accept`] from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
            wake_addr: wake_address(self.local_addr),
        }
    }

    /// Block until one peer connects.
    ///
    /// The listening socket is closed when this returns, so the channel is
    /// exhausted after a single accept: later connection attempts are refused.
    ///
    /// # Returns
    ///
    /// `Err(SimError::ChannelClosed)` if the listener was cancelled before or
    /// while waiting.
    pub fn accept(self) -> Result<AcceptedPeer> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(SimError::ChannelClosed);
        }

        let accepted = self.socket.accept();
        if self.cancelled.load(Ordering::Acquire) {
            debug!("Listener on {} cancelled", self.local_addr);
            return Err(SimError::ChannelClosed);
        }

        let (stream, peer_addr) = accepted.map_err(|e| SimError::PeerClosedEarly {
            addr: self.local_addr.to_string(),
            reason: format!("accept failed: {}", e),
        })?;
        info!("Connection established with {}", peer_addr);
        Ok(AcceptedPeer { stream, peer_addr })
    }

    /// Run accept → announce → close for `device_id` on a background worker.
    ///
    /// Fails with `WorkerSpawnFailed` if the OS refuses a new thread; the
    /// listening socket is closed in that case.
    pub fn spawn(self, device_id: impl Into<String>) -> Result<ListenerHandle> {
        let device_id = device_id.into();
        let local_addr = self.local_addr;
        let cancel = self.cancel_handle();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name(format!("handshake-accept-{}", local_addr.port()))
            .spawn(move || {
                info!("Device {} is waiting for incoming connections on {}", device_id, local_addr);
                let outcome = self.accept().and_then(|peer| {
                    let peer_addr = peer.peer_addr();
                    peer.announce(&device_id)?;
                    Ok(HandshakeReport { peer_addr, device_id })
                });
                if outcome_tx.send(outcome).is_err() {
                    debug!("Handshake outcome on {} dropped, handle is gone", local_addr);
                }
            })
            .map_err(|source| SimError::WorkerSpawnFailed {
                addr: local_addr.to_string(),
                source,
            })?;

        Ok(ListenerHandle {
            local_addr,
            cancel,
            outcome_rx,
            outcome_taken: false,
            worker: Some(worker),
        })
    }
}

/// The single connection accepted by a [`Listener`].
pub struct AcceptedPeer {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl AcceptedPeer {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send `"<device_id> is online."` and close the connection.
    pub fn announce(mut self, device_id: &str) -> Result<()> {
        let payload = encode_announcement(device_id);
        let peer = self.peer_addr;
        let closed_early = |e: std::io::Error| SimError::PeerClosedEarly {
            addr: peer.to_string(),
            reason: format!("announcement not fully sent: {}", e),
        };

        self.stream.write_all(&payload).map_err(closed_early)?;
        self.stream.flush().map_err(closed_early)?;
        debug!("Announced {} to {}", device_id, peer);

        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            // The peer may already have closed after reading everything.
            debug!("Shutdown of connection to {} reported: {}", peer, e);
        }
        Ok(())
    }
}

/// Result of a completed server-side handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReport {
    pub peer_addr: SocketAddr,
    pub device_id: String,
}

/// Cancels a listener that may be blocked in `accept()` on another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl CancelHandle {
    /// Mark the listener cancelled and wake a blocked `accept()`.
    ///
    /// Idempotent. If the listener is already gone the wake-up connection is
    /// simply refused.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Cancelling handshake listener on {}", self.wake_addr);
        match TcpStream::connect_timeout(&self.wake_addr, WAKE_CONNECT_TIMEOUT) {
            Ok(stream) => drop(stream),
            Err(e) => debug!("Wake-up connection to {} failed: {}", self.wake_addr, e),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Owner-side handle for a listener running on its worker thread.
///
/// Dropping the handle does not cancel or join the worker; call
/// [`ListenerHandle::cancel`] and [`ListenerHandle::join`] for a deterministic teardown.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    cancel: CancelHandle,
    outcome_rx: Receiver<Result<HandshakeReport>>,
    outcome_taken: bool,
    worker: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker reports. A second call yields `ChannelClosed`.
    pub fn outcome(&mut self) -> Result<HandshakeReport> {
        if self.outcome_taken {
            return Err(SimError::ChannelClosed);
        }
        self.outcome_taken = true;
        self.outcome_rx.recv().unwrap_or(Err(SimError::ChannelClosed))
    }

    /// Non-blocking variant of [`ListenerHandle::outcome`]; `None` while the worker is still waiting.
    pub fn try_outcome(&mut self) -> Option<Result<HandshakeReport>> {
        if self.outcome_taken {
            return Some(Err(SimError::ChannelClosed));
        }
        match self.outcome_rx.try_recv() {
            Ok(outcome) => {
                self.outcome_taken = true;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.outcome_taken = true;
                Some(Err(SimError::ChannelClosed))
            }
        }
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Handshake worker on {} panicked", self.local_addr);
            }
        }
    }
}

/// Address a local client can use to reach a listener bound to `local`.
fn wake_address(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}
