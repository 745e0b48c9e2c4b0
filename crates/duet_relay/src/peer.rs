//! Per-connection peer: an outbound queue plus two independent loops.
//!
//! Once admitted, a [`Peer`] runs:
//! - a receive loop that turns inbound frames into [`Message`]s tagged with
//!   the peer's slot and hands them to the relay, and
//! - a send loop that drains the peer's own outbound queue onto the wire.
//!
//! The loops share nothing but the relay. Either may end first; ending one
//! does not cancel the other.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::message::{Message, SlotId};
use crate::relay::{PeerHandle, Relay};
use crate::transport::{FrameReader, FrameWriter};

/// A connection that has been accepted but not yet activated.
pub struct Peer {
    remote: Option<SocketAddr>,
    outbound_tx: mpsc::Sender<Message>,
    outbound_rx: mpsc::Receiver<Message>,
}

/// Join handles for an active peer's two loops.
pub struct PeerTasks {
    pub send: JoinHandle<()>,
    pub receive: JoinHandle<()>,
}

impl PeerTasks {
    /// Wait for both loops to finish.
    pub async fn join(self) {
        let _ = self.receive.await;
        let _ = self.send.await;
    }
}

impl Peer {
    /// Create a peer with an outbound queue holding up to `capacity` messages.
    pub fn new(remote: Option<SocketAddr>, capacity: usize) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        Self {
            remote,
            outbound_tx,
            outbound_rx,
        }
    }

    /// The handle the relay stores when this peer claims a slot.
    pub fn handle(&self) -> PeerHandle {
        PeerHandle::new(self.outbound_tx.clone(), self.remote)
    }

    /// Remote address of the connection, if known.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// Tell the peer which slot it holds, then start both loops.
    ///
    /// The identity frame is written before the send loop starts, so it is
    /// always the first frame the client sees even if relayed traffic is
    /// already queued.
    pub async fn activate<R, W>(
        self,
        slot: SlotId,
        relay: Arc<Relay>,
        reader: R,
        mut writer: W,
    ) -> Result<PeerTasks, RelayError>
    where
        R: FrameReader + 'static,
        W: FrameWriter + 'static,
    {
        let Peer {
            remote,
            outbound_tx,
            outbound_rx,
        } = self;
        let handle = PeerHandle::new(outbound_tx, remote);

        if let Err(e) = writer.write_frame(Message::identity(slot).encode()).await {
            relay.release_slot(slot, &handle);
            return Err(e);
        }

        let send = tokio::spawn(send_loop(slot, outbound_rx, writer));
        let receive = tokio::spawn(async move {
            receive_loop(slot, Arc::clone(&relay), reader).await;
            relay.release_slot(slot, &handle);
        });

        Ok(PeerTasks { send, receive })
    }
}

/// Read frames until the connection ends, submitting each as a message from
/// `slot`.
///
/// An orderly close ends the loop quietly; any other transport error is
/// logged and also ends it.
pub async fn receive_loop<R: FrameReader>(slot: SlotId, relay: Arc<Relay>, mut reader: R) {
    loop {
        match reader.read_frame().await {
            Ok(Some(payload)) => {
                let message = Message::new(slot, payload);
                debug!("Received from slot {slot}: {}", message.payload_lossy());
                if let Err(e) = relay.submit(message) {
                    warn!("Slot {slot} cannot reach the relay: {e}");
                    break;
                }
            }
            Ok(None) => {
                info!("Slot {slot} disconnected");
                break;
            }
            Err(e) => {
                warn!("Slot {slot} receive failed: {e}");
                break;
            }
        }
    }
}

/// Write every message queued for this peer until a write fails or the
/// queue closes.
pub async fn send_loop<W: FrameWriter>(
    slot: SlotId,
    mut outbound: mpsc::Receiver<Message>,
    mut writer: W,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = writer.write_frame(message.encode()).await {
            warn!("Slot {slot} send failed: {e}");
            return;
        }
    }

    debug!("Outbound queue for slot {slot} closed");
    writer.close().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
