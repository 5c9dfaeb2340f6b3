//! SSH tunnel provider
//!
//! Exposes remote TCP services through an SSH host: one authenticated
//! session per provider instance, a remote listener per forwarding rule and
//! configured bind address, and a per-connection relay back to the private
//! destination.

pub mod config;
pub mod connector;
pub mod provider;
pub mod pump;
pub mod session;

pub use config::SshProviderConfig;
pub use connector::RusshConnector;
pub use provider::{SshProviderFactory, SshTunnelProvider};
pub use session::{
    SessionConnector, SessionError, SessionEvent, SessionStream, TunnelSession,
};
