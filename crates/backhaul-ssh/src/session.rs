//! Session seam between the provider state machine and the SSH transport
//!
//! The provider never talks to russh directly; it drives a `TunnelSession`
//! obtained from a `SessionConnector` and consumes the session's event
//! stream. Tests substitute scripted implementations of both traits.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::SshProviderConfig;

/// Byte stream carried by one accepted tunnel channel.
pub trait SessionStreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> SessionStreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Boxed accepted-channel stream.
pub type SessionStream = Box<dyn SessionStreamIo>;

/// Errors from session establishment and remote listener registration
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("SSH transport error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("Private key is not usable: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("Authentication was rejected for user {username}")]
    AuthRejected { username: String },

    #[error("Session error: {0}")]
    Other(String),
}

/// Event emitted by a live tunnel session.
///
/// The event channel closing without a `Disconnected` event counts as a
/// disconnect as well; the provider treats both the same way.
pub enum SessionEvent {
    /// The remote host accepted an inbound connection on a forwarded port.
    Accepted {
        /// Address the remote listener was bound to.
        bind_address: String,
        /// Remote port the connection arrived on.
        bind_port: u16,
        /// Peer address as reported by the remote host.
        peer_address: String,
        /// Peer port as reported by the remote host.
        peer_port: u16,
        /// The accepted channel as a byte stream.
        stream: SessionStream,
    },
    /// The transport dropped without a deliberate `close()`.
    Disconnected,
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Accepted {
                bind_address,
                bind_port,
                peer_address,
                peer_port,
                ..
            } => f
                .debug_struct("Accepted")
                .field("bind_address", bind_address)
                .field("bind_port", bind_port)
                .field("peer_address", peer_address)
                .field("peer_port", peer_port)
                .finish_non_exhaustive(),
            SessionEvent::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Opens authenticated sessions; the provider owns exactly one at a time.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens and authenticates a session, returning the session handle and
    /// the event stream the provider consumes.
    async fn connect(
        &self,
        config: &SshProviderConfig,
    ) -> Result<(Box<dyn TunnelSession>, mpsc::UnboundedReceiver<SessionEvent>), SessionError>;
}

/// One live authenticated session
#[async_trait]
pub trait TunnelSession: Send {
    /// Registers a remote listener on `bind_address:port`. Inbound
    /// connections surface as `SessionEvent::Accepted` on the event stream.
    async fn listen(&mut self, bind_address: &str, port: u16) -> Result<(), SessionError>;

    /// Tears the session down. Best effort; the event stream ends shortly
    /// after.
    async fn close(&mut self);
}
