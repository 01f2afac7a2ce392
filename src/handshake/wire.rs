//! Announcement wire format.
//!
//! One UTF-8 text message per handshake, `"<device_id> is online."`, with no
//! length prefix. The end of the message is the end of the stream.

/// Suffix that terminates every announcement.
pub const ANNOUNCEMENT_SUFFIX: &str = " is online.";

/// Upper bound on the bytes the receiving side accepts.
pub const MAX_ANNOUNCEMENT_LEN: usize = 1024;

/// A decoded announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub device_id: String,
    /// The text received, without a trailing line ending.
    pub message: String,
}

/// Why a received payload is not an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementError {
    /// Nothing arrived before EOF.
    Empty,
    /// The payload stops before the terminating suffix.
    Truncated,
    /// Wrong shape: bad UTF-8 or a missing id.
    Malformed(String),
}

/// Encode the announcement for a device.
pub fn encode_announcement(device_id: &str) -> Vec<u8> {
    format!("{}{}", device_id, ANNOUNCEMENT_SUFFIX).into_bytes()
}

/// Decode a complete payload into an [`Announcement`].
///
/// One trailing `\n` or `\r\n` is ignored. Any non-empty text that does not
/// end in the suffix is `Truncated`: with EOF as the only delimiter there is
/// no way to tell a cut-off id from a wrong one. `Malformed` is kept for
/// payloads that are not UTF-8 or carry an empty id.
pub fn decode_announcement(payload: &[u8]) -> Result<Announcement, AnnouncementError> {
    if payload.is_empty() {
        return Err(AnnouncementError::Empty);
    }
    let text = std::str::from_utf8(payload).map_err(|e| AnnouncementError::Malformed(format!("not UTF-8: {}", e)))?;
    let text = trim_line_ending(text);

    let Some(device_id) = text.strip_suffix(ANNOUNCEMENT_SUFFIX) else {
        return Err(AnnouncementError::Truncated);
    };

    if device_id.is_empty() {
        return Err(AnnouncementError::Malformed("missing device id".to_string()));
    }
    Ok(Announcement {
        device_id: device_id.to_string(),
        message: text.to_string(),
    })
}

fn trim_line_ending(text: &str) -> &str {
    text.strip_suffix("\r\n").or_else(|| text.strip_suffix('\n')).unwrap_or(text)
}
