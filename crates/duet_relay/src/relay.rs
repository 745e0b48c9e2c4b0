//! The relay: two-slot peer registry and the single dispatch loop.
//!
//! Every peer's receive loop pushes into one unbounded inbound queue, so
//! producers never block. One dispatch task drains that queue and copies
//! each message onto the bounded outbound queue of every occupied slot, in
//! slot order. A full outbound queue stalls the dispatcher (and therefore
//! delivery to both peers) until it drains; this keeps every peer seeing
//! the same global order.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SlotPolicy;
use crate::error::RelayError;
use crate::message::{Message, SlotId};

/// The relay's reference to a registered peer: the sending end of that
/// peer's outbound queue. It grants delivery, not control over the peer's
/// lifecycle.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    outbound: mpsc::Sender<Message>,
    remote: Option<SocketAddr>,
}

impl PeerHandle {
    pub(crate) fn new(outbound: mpsc::Sender<Message>, remote: Option<SocketAddr>) -> Self {
        Self { outbound, remote }
    }

    /// Remote address of the connection, if known.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// Whether both handles point at the same peer's queue.
    pub fn is_same_peer(&self, other: &PeerHandle) -> bool {
        self.outbound.same_channel(&other.outbound)
    }
}

/// Two-slot message relay.
///
/// Construct one per listening endpoint and share it behind an `Arc`; the
/// admission path and every peer loop receive it explicitly.
pub struct Relay {
    /// Slot table. Index 0 is slot 1. Registration holds the lock for the
    /// whole claim so concurrent admissions are decided one at a time.
    slots: Mutex<[Option<PeerHandle>; 2]>,
    inbound_tx: mpsc::UnboundedSender<Message>,
    /// Taken by whichever dispatch loop starts first.
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    policy: SlotPolicy,
}

impl Relay {
    /// Create a relay with both slots empty.
    pub fn new(policy: SlotPolicy) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            slots: Mutex::new([None, None]),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            policy,
        }
    }

    /// The slot policy this relay was built with.
    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    /// Claim slot 1, else slot 2, for `peer`. Returns `None` when both are
    /// taken; that is a capacity answer, not a failure.
    pub fn register_slot(&self, peer: PeerHandle) -> Option<SlotId> {
        let mut slots = self.slots.lock();
        for slot in SlotId::ALL {
            let entry = &mut slots[slot.index()];
            if entry.is_none() {
                *entry = Some(peer);
                return Some(slot);
            }
        }
        None
    }

    /// Vacate `slot` if the relay's policy allows it and `peer` still holds
    /// it. Returns whether the slot was freed.
    pub fn release_slot(&self, slot: SlotId, peer: &PeerHandle) -> bool {
        if self.policy == SlotPolicy::Permanent {
            debug!("Slot {slot} stays occupied after disconnect");
            return false;
        }

        let mut slots = self.slots.lock();
        let held_by_peer = slots[slot.index()]
            .as_ref()
            .is_some_and(|current| current.is_same_peer(peer));
        if held_by_peer {
            slots[slot.index()] = None;
            info!("Slot {slot} is free again");
        }
        held_by_peer
    }

    /// Slots that currently hold a peer, in slot order.
    pub fn occupied_slots(&self) -> Vec<SlotId> {
        let slots = self.slots.lock();
        SlotId::ALL
            .into_iter()
            .filter(|slot| slots[slot.index()].is_some())
            .collect()
    }

    /// Queue a message for fan-out. Never blocks.
    pub fn submit(&self, message: Message) -> Result<(), RelayError> {
        self.inbound_tx
            .send(message)
            .map_err(|_| RelayError::RelayClosed)
    }

    /// Start the dispatch loop on its own task.
    pub fn spawn_dispatch(self: &Arc<Self>) -> Result<JoinHandle<()>, RelayError> {
        let inbound = self.take_inbound()?;
        let relay = Arc::clone(self);
        Ok(tokio::spawn(async move {
            relay.dispatch_loop(inbound).await;
        }))
    }

    /// Run the dispatch loop on the current task. Only one dispatch loop may
    /// ever run per relay.
    pub async fn run_dispatch(&self) -> Result<(), RelayError> {
        let inbound = self.take_inbound()?;
        self.dispatch_loop(inbound).await;
        Ok(())
    }

    fn take_inbound(&self) -> Result<mpsc::UnboundedReceiver<Message>, RelayError> {
        self.inbound_rx
            .lock()
            .take()
            .ok_or(RelayError::DispatchAlreadyRunning)
    }

    async fn dispatch_loop(&self, mut inbound: mpsc::UnboundedReceiver<Message>) {
        debug!("Dispatch loop started");

        // The relay keeps a sender alive, so this only ends if the relay
        // itself is torn down.
        while let Some(message) = inbound.recv().await {
            // Recipients are whoever holds a slot now, not when the message
            // was queued.
            let recipients: Vec<(SlotId, mpsc::Sender<Message>)> = {
                let slots = self.slots.lock();
                SlotId::ALL
                    .into_iter()
                    .filter_map(|slot| {
                        slots[slot.index()]
                            .as_ref()
                            .map(|peer| (slot, peer.outbound.clone()))
                    })
                    .collect()
            };

            for (slot, outbound) in recipients {
                debug!(
                    "Broadcasting to slot {slot}: {} {}",
                    message.source(),
                    message.payload_lossy()
                );
                if outbound.send(message.clone()).await.is_err() {
                    debug!("Slot {slot} no longer drains its queue; skipping");
                }
            }
        }

        debug!("Dispatch loop finished");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
