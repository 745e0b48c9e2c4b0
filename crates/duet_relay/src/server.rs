//! Listening endpoint: binds the port and feeds connections to admission.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::admission::{self, Admission};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::Relay;

/// A bound relay endpoint, ready to run.
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    config: Arc<RelayConfig>,
}

impl RelayServer {
    /// Bind the configured address and create a fresh relay.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let relay = Arc::new(Relay::new(config.slot_policy));
        Self::bind_with_relay(config, relay).await
    }

    /// Bind the configured address, serving an existing relay.
    pub async fn bind_with_relay(
        config: RelayConfig,
        relay: Arc<Relay>,
    ) -> Result<Self, RelayError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        info!("Relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            relay,
            config: Arc::new(config),
        })
    }

    /// The address actually bound (useful when the configured port is 0).
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// The relay this server feeds.
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Start the dispatch loop and accept connections forever.
    ///
    /// Each connection is admitted on its own task. Accept and handshake
    /// failures are logged and never stop the server.
    pub async fn run(self) -> Result<(), RelayError> {
        self.relay.spawn_dispatch()?;

        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    info!("Connection request from {remote}");
                    let relay = Arc::clone(&self.relay);
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        match admission::admit(relay, stream, remote, &config).await {
                            Ok(Admission::Accepted { slot, .. }) => {
                                debug!("Admission of {remote} finished with slot {slot}");
                            }
                            Ok(Admission::Rejected) | Ok(Admission::UnknownPath) => {}
                            Err(e) => error!("Admission of {remote} failed: {e}"),
                        }
                    });
                }
                Err(e) => {
                    error!("TCP accept failed: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> RelayConfig {
        RelayConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = RelayServer::bind(loopback_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.relay().occupied_slots().is_empty());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_a_bind_error() {
        let first = RelayServer::bind(loopback_config()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let mut config = loopback_config();
        config.port = taken.port();
        match RelayServer::bind(config).await {
            Err(RelayError::Bind { addr, .. }) => assert_eq!(addr, taken),
            Err(other) => panic!("Expected Bind error, got {other:?}"),
            Ok(_) => panic!("Second bind on {taken} should fail"),
        }
    }

    #[tokio::test]
    async fn test_run_refuses_a_second_dispatcher() {
        let relay = Arc::new(Relay::new(crate::config::SlotPolicy::Permanent));
        let _dispatcher = relay.spawn_dispatch().unwrap();

        let server = RelayServer::bind_with_relay(loopback_config(), relay)
            .await
            .unwrap();
        assert!(matches!(
            server.run().await,
            Err(RelayError::DispatchAlreadyRunning)
        ));
    }
}
