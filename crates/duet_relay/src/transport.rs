//! Framed transport: the seam between the relay core and WebSocket I/O.
//!
//! The core only needs to read one frame, write one frame, and tell an
//! orderly hang-up apart from a fault. [`FrameReader`] and [`FrameWriter`]
//! capture exactly that; [`WsFrameReader`] / [`WsFrameWriter`] implement
//! them over the two halves of a `tokio-tungstenite` stream. The frame size
//! cap is enforced here, before the core ever sees a payload.

use std::io::ErrorKind;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::trace;

use crate::error::RelayError;

/// The read side of a framed, bidirectional connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next frame.
    ///
    /// Returns `Ok(None)` when the remote side went away in an expected
    /// manner (close handshake, going-away, dropped socket). Any other
    /// failure is an `Err`.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError>;
}

/// The write side of a framed, bidirectional connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one frame.
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), RelayError>;

    /// Best-effort orderly close.
    async fn close(&mut self);
}

/// Transport settings derived from the configured frame cap.
///
/// Both a single frame and a reassembled message are limited, so an
/// oversized payload is refused no matter how the client fragments it.
pub fn websocket_config(max_message_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);
    config
}

/// Split an upgraded WebSocket into relay reader/writer halves.
pub fn split<S>(ws: WebSocketStream<S>) -> (WsFrameReader<S>, WsFrameWriter<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    (WsFrameReader { stream }, WsFrameWriter { sink })
}

/// Read half of a WebSocket connection.
pub struct WsFrameReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket connection.
pub struct WsFrameWriter<S> {
    sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

#[async_trait]
impl<S> FrameReader for WsFrameReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(WsMessage::Binary(bytes)) => return Ok(Some(bytes.to_vec())),
                Ok(WsMessage::Close(frame)) => {
                    return match frame.as_ref().map(|f| f.code) {
                        None | Some(CloseCode::Normal) | Some(CloseCode::Away) => Ok(None),
                        Some(code) => Err(RelayError::Transport(format!(
                            "Unexpected close code {}",
                            u16::from(code)
                        ))),
                    };
                }
                Ok(other) => trace!("Ignoring control frame: {other:?}"),
                Err(e) if is_expected_disconnect(&e) => return Ok(None),
                Err(e) => return Err(RelayError::Transport(format!("Read error: {e}"))),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<S> FrameWriter for WsFrameWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), RelayError> {
        // Clients exchange text; anything that is not UTF-8 goes out as binary.
        let msg = match String::from_utf8(frame) {
            Ok(text) => WsMessage::text(text),
            Err(e) => WsMessage::binary(e.into_bytes()),
        };
        self.sink
            .send(msg)
            .await
            .map_err(|e| RelayError::Transport(format!("Send error: {e}")))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
    }
}

/// Errors that mean the peer simply left rather than misbehaved.
fn is_expected_disconnect(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// In-memory transport for unit tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
