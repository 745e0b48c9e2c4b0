//! Duet Relay: a two-seat WebSocket message relay.
//!
//! Exactly two peers (say, the two players of a game) connect; whatever one
//! sends is tagged with its slot and delivered to both of them, sender
//! included. A third connection is turned away while both slots are held.
//!
//! # Architecture
//!
//! - **Transport**: WebSocket (via `tokio-tungstenite`), behind the
//!   [`FrameReader`] / [`FrameWriter`] seam.
//! - **Admission**: a slot is claimed during the handshake, before the
//!   upgrade is accepted.
//! - **Peer**: one receive loop and one send loop per connection.
//! - **Relay**: a two-slot registry plus a single dispatch loop that fans
//!   every message out in arrival order.
//!
//! # Wire format
//!
//! Every frame the relay writes is the sender's slot in ASCII decimal, one
//! space, then the payload verbatim. Right after admission a peer receives
//! `"<its slot> "` with an empty payload.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use duet_relay::{RelayConfig, RelayServer};
//!
//! # async fn example() -> Result<(), duet_relay::RelayError> {
//! let server = RelayServer::bind(RelayConfig::default()).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod client;
pub mod config;
pub mod error;
pub mod interfaces;
pub mod message;
pub mod peer;
pub mod relay;
pub mod server;
pub mod transport;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use admission::Admission;
pub use client::RelayClient;
pub use config::{RelayConfig, SlotPolicy};
pub use error::RelayError;
pub use message::{Message, SlotId};
pub use peer::{Peer, PeerTasks};
pub use relay::{PeerHandle, Relay};
pub use server::RelayServer;
pub use transport::{FrameReader, FrameWriter};
