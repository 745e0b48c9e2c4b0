//! Connection admission: claim a slot, then (and only then) upgrade.
//!
//! The slot is claimed from inside the WebSocket handshake callback, after
//! the upgrade request has been read but before the `101` response is
//! written. A connection that finds both slots taken gets a plain HTTP
//! `503` and never becomes a WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{
    Callback, ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::message::SlotId;
use crate::peer::{Peer, PeerTasks};
use crate::relay::{PeerHandle, Relay};
use crate::transport;

/// How an incoming connection was handled.
pub enum Admission {
    /// The connection holds `slot` and both of its loops are running.
    Accepted { slot: SlotId, tasks: PeerTasks },
    /// Both slots were occupied; the upgrade was declined.
    Rejected,
    /// The request targeted a path other than the configured one.
    UnknownPath,
}

/// What the handshake callback decided.
enum Verdict {
    Pending,
    Claimed(SlotId),
    NoRoom,
    WrongPath,
}

/// Handshake callback that registers the peer with the relay.
struct AdmissionGate<'a> {
    relay: &'a Relay,
    peer: PeerHandle,
    path: &'a str,
    verdict: &'a mut Verdict,
}

impl Callback for AdmissionGate<'_> {
    fn on_request(self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        if request.uri().path() != self.path {
            *self.verdict = Verdict::WrongPath;
            return Err(refusal(StatusCode::NOT_FOUND, "unknown path"));
        }

        match self.relay.register_slot(self.peer) {
            Some(slot) => {
                *self.verdict = Verdict::Claimed(slot);
                Ok(response)
            }
            None => {
                *self.verdict = Verdict::NoRoom;
                Err(refusal(StatusCode::SERVICE_UNAVAILABLE, "no room"))
            }
        }
    }
}

fn refusal(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Admit one raw connection: claim a slot, complete the WebSocket
/// handshake, send the identity frame, and start the peer's loops.
pub async fn admit<S>(
    relay: Arc<Relay>,
    stream: S,
    remote: SocketAddr,
    config: &RelayConfig,
) -> Result<Admission, RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let peer = Peer::new(Some(remote), config.outbound_capacity);
    let mut verdict = Verdict::Pending;

    let gate = AdmissionGate {
        relay: &relay,
        peer: peer.handle(),
        path: &config.path,
        verdict: &mut verdict,
    };
    let handshake = accept_hdr_async_with_config(
        stream,
        gate,
        Some(transport::websocket_config(config.max_message_size)),
    )
    .await;

    match (handshake, verdict) {
        (Ok(ws), Verdict::Claimed(slot)) => {
            let (reader, writer) = transport::split(ws);
            let tasks = peer.activate(slot, relay, reader, writer).await?;
            info!("{remote} is now Player {slot}");
            Ok(Admission::Accepted { slot, tasks })
        }
        (_, Verdict::NoRoom) => {
            info!("Rejected {remote}; no more space for new clients");
            Ok(Admission::Rejected)
        }
        (_, Verdict::WrongPath) => {
            info!("Refused {remote}; unknown request path");
            Ok(Admission::UnknownPath)
        }
        (Err(e), Verdict::Claimed(slot)) => {
            relay.release_slot(slot, &peer.handle());
            Err(RelayError::Transport(format!(
                "Handshake failed after claiming slot {slot}: {e}"
            )))
        }
        (Err(e), Verdict::Pending) => Err(RelayError::Transport(format!("Handshake failed: {e}"))),
        (Ok(_), Verdict::Pending) => Err(RelayError::Transport(
            "Handshake completed without an admission decision".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
