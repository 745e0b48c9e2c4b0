//! Client side of the relay protocol.
//!
//! [`RelayClient::connect`] performs the WebSocket handshake and waits for
//! the identity frame so the caller knows which slot it holds before
//! sending anything. Incoming frames are decoded on a background task and
//! queued until the caller asks for them.

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::message::{Message, SlotId};
use crate::transport::{self, FrameReader, FrameWriter, WsFrameWriter};

/// A connection to a relay, holding one slot.
pub struct RelayClient {
    slot: SlotId,
    writer: WsFrameWriter<MaybeTlsStream<TcpStream>>,
    incoming: mpsc::UnboundedReceiver<Message>,
    reader_task: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to `addr` (`host:port` or a full `ws://` URL) and learn our
    /// slot from the relay's first frame.
    pub async fn connect(addr: &str) -> Result<Self, RelayError> {
        let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
            addr.to_string()
        } else {
            format!("ws://{addr}")
        };

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| RelayError::Transport(format!("Connect to {url} failed: {e}")))?;
        let (mut reader, writer) = transport::split(ws_stream);

        debug!("Waiting for identity frame from {url}");
        let frame = reader.read_frame().await?.ok_or_else(|| {
            RelayError::Transport("Connection closed before identity frame".into())
        })?;
        let slot = Message::decode(&frame)?.source();
        info!("Connected to {url} as slot {slot}");

        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(async move {
            loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => match Message::decode(&frame) {
                        Ok(message) => {
                            if incoming_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Discarding frame from relay: {e}"),
                    },
                    Ok(None) => {
                        debug!("Relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Relay connection failed: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            slot,
            writer,
            incoming,
            reader_task,
        })
    }

    /// The slot the relay assigned to this connection.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Send one payload. The relay tags it with our slot.
    pub async fn send(&mut self, payload: impl Into<Vec<u8>>) -> Result<(), RelayError> {
        self.writer.write_frame(payload.into()).await
    }

    /// Wait for the next relayed message. `None` once the connection is
    /// gone and everything received has been consumed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.incoming.recv().await
    }

    /// Everything received so far, without waiting.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.incoming.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Close the connection.
    pub async fn close(mut self) {
        self.writer.close().await;
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
