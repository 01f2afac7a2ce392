//! Session file loading and validation.
//!
//! A session file describes the two devices and an optional list of moves
//! applied to the local device:
//!
//! ```json
//! {
//!   "local": { "id": "A", "position": { "x": 0, "y": 0, "z": 0 }, "range": 10 },
//!   "peer":  { "id": "B", "position": { "x": 3, "y": 4, "z": 0 }, "range": 10 },
//!   "moves": [ { "dx": 10, "dy": 10, "dz": 10 } ]
//! }
//! ```
//!
//! When `peer` is omitted it is derived from `local` the same way
//! `Session::start` does, using `peer_id` (default `"peer"`).

use anyhow::Context;
use serde::Deserialize;
use std::fs;

use crate::device::{Device, Position};
use crate::session::Session;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    pub id: String,
    pub position: Position,
    pub range: f64,
}

impl DeviceSpec {
    pub fn build(&self) -> crate::error::Result<Device> {
        Device::create(self.id.clone(), self.position.x, self.position.y, self.position.z, self.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Move {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFile {
    pub local: DeviceSpec,
    #[serde(default)]
    pub peer: Option<DeviceSpec>,
    #[serde(default = "default_peer_id")]
    pub peer_id: String,
    #[serde(default)]
    pub moves: Vec<Move>,
}

fn default_peer_id() -> String {
    "peer".to_string()
}

impl SessionFile {
    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        serde_json::from_str(data).context("Invalid JSON format")
    }

    /// Build the session described by this file. Validation is the same as for hand-entered devices.
    pub fn build_session(&self) -> anyhow::Result<Session> {
        let local = self.local.build().context("Invalid local device")?;
        let session = match &self.peer {
            Some(peer) => Session::with_peer(local, peer.build().context("Invalid peer device")?)?,
            None => Session::start(local, self.peer_id.clone())?,
        };
        Ok(session)
    }
}

/// Load and parse a session file.
pub fn load_session_file(path: &str) -> anyhow::Result<SessionFile> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?;
    SessionFile::from_json(&data)
}
