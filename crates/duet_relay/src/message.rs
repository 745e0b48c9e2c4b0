//! Relay messages: a payload tagged with the slot that sent it.

use std::fmt;

use crate::error::RelayError;

/// One of the two fixed positions a connected peer can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// The first slot, claimed by the first admitted peer.
    pub const ONE: SlotId = SlotId(1);
    /// The second slot.
    pub const TWO: SlotId = SlotId(2);
    /// All slots, in claim order.
    pub const ALL: [SlotId; 2] = [SlotId::ONE, SlotId::TWO];

    /// Create a slot id, rejecting anything outside `1..=2`.
    pub fn new(id: u8) -> Result<Self, RelayError> {
        match id {
            1 | 2 => Ok(Self(id)),
            other => Err(RelayError::InvalidSlot(other)),
        }
    }

    /// The numeric slot id (1 or 2).
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position in the relay's slot table.
    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = RelayError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> u8 {
        slot.0
    }
}

/// A payload received from one peer, tagged with its sender's slot.
///
/// The source is fixed when the owning peer's receive loop builds the
/// message; fan-out hands each recipient its own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    source: SlotId,
    payload: Vec<u8>,
}

impl Message {
    /// Wrap a payload received from `source`.
    pub fn new(source: SlotId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            source,
            payload: payload.into(),
        }
    }

    /// The zero-payload message that tells a newly admitted peer its slot.
    pub fn identity(slot: SlotId) -> Self {
        Self::new(slot, Vec::new())
    }

    /// The slot that produced this message.
    pub fn source(&self) -> SlotId {
        self.source
    }

    /// The raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the message, returning the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Render the wire frame: decimal source id, one space, then the payload
    /// verbatim. No escaping, no trailing delimiter.
    pub fn encode(&self) -> Vec<u8> {
        let prefix = format!("{} ", self.source);
        let mut frame = Vec::with_capacity(prefix.len() + self.payload.len());
        frame.extend_from_slice(prefix.as_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }

    /// Parse a frame produced by [`encode`](Self::encode). Everything after
    /// the first space is payload, so payloads may themselves contain spaces.
    pub fn decode(frame: &[u8]) -> Result<Self, RelayError> {
        let split = frame
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| RelayError::MalformedFrame("missing slot separator".into()))?;

        let id = std::str::from_utf8(&frame[..split])
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| {
                RelayError::MalformedFrame(format!(
                    "bad slot prefix {:?}",
                    String::from_utf8_lossy(&frame[..split])
                ))
            })?;

        Ok(Self::new(SlotId::new(id)?, &frame[split + 1..]))
    }

    /// Lossy text rendering of the payload, for log lines.
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
