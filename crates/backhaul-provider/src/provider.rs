//! The polymorphic capability contract all tunnel transports implement

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::log::LogEntry;
use crate::types::{ConnectedClient, ForwardRule, Protocol, ProviderState};

/// Capability contract between the external routing layer and a tunnel
/// transport.
///
/// Implementations own their rule store, client registry and event log;
/// callers only observe them through the snapshot accessors. `start` and
/// `stop` report failure as a boolean because failing to reach the remote
/// host is an expected condition, not an exceptional one.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Acquires the underlying transport session. Not guaranteed idempotent;
    /// callers must not invoke it while already started.
    async fn start(&self) -> bool;

    /// Releases the transport session and clears all rules and clients.
    /// Only valid from the started state.
    async fn stop(&self) -> bool;

    /// Creates a forwarding rule and opens its remote listeners. A rule that
    /// already exists for the tuple is left untouched, even if disabled.
    async fn add_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError>;

    /// Disables the rule matching the tuple; no-op if none matches. Already
    /// active relays keep running until their streams end.
    async fn remove_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError>;

    /// Read-only snapshot of the currently relaying connections.
    fn connections(&self) -> Vec<ConnectedClient>;

    /// Read-only snapshot of the rule store.
    fn rules(&self) -> Vec<ForwardRule>;

    /// Current lifecycle state.
    fn state(&self) -> ProviderState;

    /// Snapshot of the lifecycle event log.
    fn logs(&self) -> Vec<LogEntry>;
}
