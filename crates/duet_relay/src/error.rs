//! Relay error types.

use std::net::SocketAddr;

/// Errors that can occur in the duet_relay crate.
///
/// A connection turned away because both slots are taken is not an error;
/// see [`Admission::Rejected`](crate::admission::Admission::Rejected).
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (WebSocket handshake/send/receive).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The listening endpoint could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A frame did not have the `<slot> <payload>` shape.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A slot number outside `1..=2`.
    #[error("Invalid slot id: {0}")]
    InvalidSlot(u8),

    /// Local network interfaces could not be enumerated.
    #[error("Cannot enumerate network interfaces: {0}")]
    Interfaces(String),

    /// `run_dispatch` was called while another dispatch loop owns the
    /// inbound queue.
    #[error("Dispatch loop already running")]
    DispatchAlreadyRunning,

    /// The relay's inbound queue is gone; no dispatcher will ever read it.
    #[error("Relay is no longer accepting messages")]
    RelayClosed,

    /// JSON config serialization / deserialization failed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
