//! russh-backed implementation of the session seam

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::{decode_secret_key, PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, Disconnect};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SshProviderConfig;
use crate::session::{SessionConnector, SessionError, SessionEvent, TunnelSession};

/// Client handler that surfaces forwarded channels as session events.
///
/// When the session dies the handler is dropped with it, which closes the
/// event channel; the provider treats that the same as an explicit
/// disconnect event.
struct ClientHandler {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send {
        // The remote host is trusted as configured; no known-hosts store.
        debug!(key = ?server_public_key.algorithm(), "accepting server host key");
        async { Ok(true) }
    }

    fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<client::Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        let event = SessionEvent::Accepted {
            bind_address: connected_address.to_string(),
            bind_port: connected_port as u16,
            peer_address: originator_address.to_string(),
            peer_port: originator_port as u16,
            stream: Box::new(channel.into_stream()),
        };
        // A send failure means no consumer is left; dropping the event
        // closes the channel and rejects the connection.
        let delivered = self.events.send(event).is_ok();
        async move {
            if !delivered {
                debug!("forwarded channel arrived with no event consumer, dropping it");
            }
            Ok(())
        }
    }
}

/// One live russh session
struct RusshSession {
    handle: client::Handle<ClientHandler>,
}

#[async_trait]
impl TunnelSession for RusshSession {
    async fn listen(&mut self, bind_address: &str, port: u16) -> Result<(), SessionError> {
        let assigned = self
            .handle
            .tcpip_forward(bind_address, u32::from(port))
            .await?;
        // 0 means the server bound the requested port without reporting it.
        if assigned != 0 && assigned != u32::from(port) {
            warn!(
                requested = port,
                assigned, "server bound the remote listener on a different port"
            );
        }
        debug!(bind_address, port, "remote listener registered");
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
        {
            debug!("session disconnect returned an error: {}", e);
        }
    }
}

/// Opens authenticated SSH sessions using public-key auth
#[derive(Debug, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Transport tuning; keepalives surface a dead session as a disconnect.
fn client_config() -> client::Config {
    client::Config {
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    }
}

#[async_trait]
impl SessionConnector for RusshConnector {
    async fn connect(
        &self,
        config: &SshProviderConfig,
    ) -> Result<(Box<dyn TunnelSession>, mpsc::UnboundedReceiver<SessionEvent>), SessionError>
    {
        let key = decode_secret_key(&config.private_key, None)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handler = ClientHandler { events: events_tx };

        let mut handle = client::connect(
            Arc::new(client_config()),
            (config.ip.as_str(), config.port),
            handler,
        )
        .await?;

        let auth = handle
            .authenticate_publickey(
                config.username.clone(),
                PrivateKeyWithHashAlg::new(Arc::new(key), None),
            )
            .await?;
        if !auth.success() {
            return Err(SessionError::AuthRejected {
                username: config.username.clone(),
            });
        }

        debug!(
            host = %config.ip,
            port = config.port,
            username = %config.username,
            "SSH session established"
        );
        Ok((Box::new(RusshSession { handle }), events_rx))
    }
}
