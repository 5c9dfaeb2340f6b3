//! Session-based tunnel provider state machine
//!
//! Owns the rule store, client registry and event log, drives exactly one
//! tunnel session at a time, and replays enabled rules after an involuntary
//! disconnect. The external routing layer only talks to this through the
//! capability contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use backhaul_provider::{
    validate_connection_parameters, CheckResult, ConfigError, ConnectedClient, EventLog,
    ForwardRule, LogEntry, Protocol, ProviderError, ProviderFactory, ProviderState, RuleKey,
    TunnelProvider,
};

use crate::config::SshProviderConfig;
use crate::connector::RusshConnector;
use crate::pump;
use crate::session::{SessionConnector, SessionEvent, SessionStream, TunnelSession};

struct Core {
    config: SshProviderConfig,
    connector: Arc<dyn SessionConnector>,
    state: RwLock<ProviderState>,
    rules: RwLock<Vec<ForwardRule>>,
    clients: RwLock<Vec<ConnectedClient>>,
    /// Remote dest port -> owning rule key, for accept-time re-resolution.
    bindings: RwLock<HashMap<u16, RuleKey>>,
    session: tokio::sync::Mutex<Option<Box<dyn TunnelSession>>>,
    logs: EventLog,
    /// Held for the duration of snapshot, restart and replay; mutating
    /// calls are rejected and further disconnects are ignored while set.
    reconnecting: AtomicBool,
    /// Bumped per established session so a stale event loop cannot trigger
    /// a reconnect against its successor.
    generation: AtomicU64,
}

impl Core {
    fn current_state(&self) -> ProviderState {
        *self.state.read().unwrap()
    }

    fn set_state(&self, next: ProviderState) {
        *self.state.write().unwrap() = next;
    }

    async fn start_session(self: &Arc<Self>) -> bool {
        self.set_state(ProviderState::Starting);
        self.logs.record("Starting SSH tunnel provider...");
        info!(
            host = %self.config.ip,
            port = self.config.port,
            "starting SSH tunnel provider"
        );

        // Dispose any stale session before opening a new one.
        if let Some(mut stale) = self.session.lock().await.take() {
            stale.close().await;
        }

        match self.connector.connect(&self.config).await {
            Ok((session, events)) => {
                *self.session.lock().await = Some(session);
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                self.spawn_event_loop(events, generation);
                self.set_state(ProviderState::Started);
                self.logs.record("SSH tunnel provider started");
                info!("SSH tunnel provider started");
                true
            }
            Err(e) => {
                self.logs
                    .record(format!("Failed to start SSH tunnel provider: {}", e));
                error!("failed to start SSH tunnel provider: {}", e);
                self.set_state(ProviderState::Stopped);
                false
            }
        }
    }

    async fn shutdown_session(&self) -> bool {
        self.set_state(ProviderState::Stopping);
        self.logs.record("Stopping SSH tunnel provider...");
        info!("stopping SSH tunnel provider");

        self.rules.write().unwrap().clear();
        self.clients.write().unwrap().clear();
        self.bindings.write().unwrap().clear();

        if let Some(mut session) = self.session.lock().await.take() {
            session.close().await;
        }

        self.set_state(ProviderState::Stopped);
        self.logs.record("SSH tunnel provider stopped");
        true
    }

    fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        generation: u64,
    ) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Some(SessionEvent::Accepted {
                        bind_address,
                        bind_port,
                        peer_address,
                        peer_port,
                        stream,
                    }) => {
                        core.handle_accepted(&bind_address, bind_port, peer_address, peer_port, stream);
                    }
                    // A closed event channel is a disconnect the session
                    // never got to announce.
                    Some(SessionEvent::Disconnected) | None => break,
                }
            }
            core.handle_disconnect(generation).await;
        });
    }

    /// Wires one accepted connection into the data plane.
    ///
    /// The rule is re-resolved by tuple at accept time so a removal that
    /// happened after the listener was registered is observed; returning
    /// early drops the stream, which rejects the connection.
    fn handle_accepted(
        self: &Arc<Self>,
        bind_address: &str,
        bind_port: u16,
        peer_address: String,
        peer_port: u16,
        stream: SessionStream,
    ) {
        let Some(key) = self.bindings.read().unwrap().get(&bind_port).cloned() else {
            debug!(
                bind_address,
                bind_port, "inbound connection on a port with no rule, rejecting"
            );
            return;
        };
        let enabled = self
            .rules
            .read()
            .unwrap()
            .iter()
            .find(|rule| rule.key == key)
            .map(|rule| rule.enabled)
            .unwrap_or(false);
        if !enabled {
            debug!(rule = %key, "inbound connection for a disabled rule, rejecting");
            return;
        }

        let client = ConnectedClient::new(peer_address, peer_port, key.clone());
        let client_id = client.id;
        info!(
            peer_ip = %client.ip,
            peer_port = client.port,
            rule = %key,
            "accepted tunnel connection"
        );
        self.clients.write().unwrap().push(client);

        let core = Arc::clone(self);
        tokio::spawn(async move {
            match TcpStream::connect((key.source_ip.as_str(), key.source_port)).await {
                Ok(socket) => {
                    let (to_destination, to_channel) = pump::relay(stream, socket).await;
                    debug!(rule = %key, to_destination, to_channel, "relay finished");
                }
                Err(e) => {
                    warn!(rule = %key, "failed to dial destination: {}", e);
                }
            }
            core.clients.write().unwrap().retain(|c| c.id != client_id);
        });
    }

    /// Reconnect protocol: snapshot the rules, reset both stores, restart
    /// the session and replay what was enabled. Fires only for a session
    /// lost while started, never for a deliberate stop.
    async fn handle_disconnect(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if self.current_state() != ProviderState::Started {
            return;
        }
        // Only one reconnect may run at a time; a disconnect arriving from
        // the freshly established session mid-replay must not release the
        // guard while the first pass is still rebuilding.
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            debug!("disconnect during an in-flight reconnect, ignoring");
            return;
        }

        self.logs.record("SSH session lost, attempting to reconnect");
        warn!("SSH session lost, attempting to reconnect");

        let snapshot = std::mem::take(&mut *self.rules.write().unwrap());
        self.clients.write().unwrap().clear();
        self.bindings.write().unwrap().clear();

        if self.start_session().await && self.current_state() == ProviderState::Started {
            let mut replayed = 0usize;
            for rule in snapshot.into_iter().filter(|rule| rule.enabled) {
                match self.register_rule(rule.key.clone(), rule.protocol).await {
                    Ok(()) => replayed += 1,
                    Err(e) => {
                        warn!(rule = %rule.key, "failed to replay rule after reconnect: {}", e);
                    }
                }
            }
            self.logs
                .record(format!("Replayed {} forwarding rules after reconnect", replayed));
            info!(replayed, "reconnect complete");
        } else {
            self.logs.record("Reconnect failed, provider is stopped");
            warn!("reconnect failed, provider is stopped");
        }

        self.reconnecting.store(false, Ordering::SeqCst);
    }

    /// Creates a rule and registers its remote listeners. An existing tuple
    /// is left untouched, even when disabled; only removal mutates the
    /// enabled flag.
    async fn register_rule(&self, key: RuleKey, protocol: Protocol) -> Result<(), ProviderError> {
        let mut session_guard = self.session.lock().await;
        let session = session_guard.as_mut().ok_or(ProviderError::NotStarted)?;

        if self.rules.read().unwrap().iter().any(|rule| rule.key == key) {
            return Ok(());
        }

        // First rule on a port owns the binding; a later rule for the same
        // port cannot get a second remote listener anyway.
        self.bindings
            .write()
            .unwrap()
            .entry(key.dest_port)
            .or_insert_with(|| key.clone());

        for bind_address in &self.config.listen_on_ips {
            if let Err(e) = session.listen(bind_address, key.dest_port).await {
                self.logs.record(format!(
                    "Failed to open remote listener on {}:{}: {}",
                    bind_address, key.dest_port, e
                ));
                warn!(
                    bind_address = %bind_address,
                    port = key.dest_port,
                    "failed to open remote listener: {}",
                    e
                );
            }
        }

        // Pushed while the session lock is still held, so the duplicate
        // check above and this insert are atomic.
        debug!(rule = %key, "forwarding rule added");
        self.rules
            .write()
            .unwrap()
            .push(ForwardRule::new(key, protocol));
        Ok(())
    }

    fn disable_rule(&self, key: &RuleKey) {
        if let Some(rule) = self
            .rules
            .write()
            .unwrap()
            .iter_mut()
            .find(|rule| rule.key == *key)
        {
            rule.enabled = false;
            debug!(rule = %key, "forwarding rule disabled");
        }
    }
}

/// Tunnel provider backed by one authenticated SSH session
pub struct SshTunnelProvider {
    core: Arc<Core>,
}

impl SshTunnelProvider {
    /// Builds a provider over the russh connector. Construction performs no
    /// network work.
    pub fn new(config: SshProviderConfig) -> Self {
        Self::with_connector(config, Arc::new(RusshConnector::new()))
    }

    /// Builds a provider over a caller-supplied connector.
    pub fn with_connector(
        config: SshProviderConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                config,
                connector,
                state: RwLock::new(ProviderState::Stopped),
                rules: RwLock::new(Vec::new()),
                clients: RwLock::new(Vec::new()),
                bindings: RwLock::new(HashMap::new()),
                session: tokio::sync::Mutex::new(None),
                logs: EventLog::new(),
                reconnecting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

#[async_trait]
impl TunnelProvider for SshTunnelProvider {
    async fn start(&self) -> bool {
        self.core.start_session().await
    }

    async fn stop(&self) -> bool {
        self.core.shutdown_session().await
    }

    async fn add_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError> {
        validate_connection_parameters(source_ip, source_port, dest_port, protocol)?;
        if self.core.reconnecting.load(Ordering::SeqCst) {
            return Err(ProviderError::Reconnecting);
        }
        self.core
            .register_rule(RuleKey::new(source_ip, source_port, dest_port), protocol)
            .await
    }

    async fn remove_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError> {
        validate_connection_parameters(source_ip, source_port, dest_port, protocol)?;
        if self.core.reconnecting.load(Ordering::SeqCst) {
            return Err(ProviderError::Reconnecting);
        }
        self.core
            .disable_rule(&RuleKey::new(source_ip, source_port, dest_port));
        Ok(())
    }

    fn connections(&self) -> Vec<ConnectedClient> {
        self.core.clients.read().unwrap().clone()
    }

    fn rules(&self) -> Vec<ForwardRule> {
        self.core.rules.read().unwrap().clone()
    }

    fn state(&self) -> ProviderState {
        self.core.current_state()
    }

    fn logs(&self) -> Vec<LogEntry> {
        self.core.logs.snapshot()
    }
}

/// Factory registering the SSH provider under `"ssh"`
pub struct SshProviderFactory;

impl ProviderFactory for SshProviderFactory {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn check_config(&self, raw: &str) -> CheckResult {
        SshProviderConfig::check(raw)
    }

    fn create(&self, raw: &str) -> Result<Arc<dyn TunnelProvider>, ConfigError> {
        let config = SshProviderConfig::parse(raw)?;
        Ok(Arc::new(SshTunnelProvider::new(config)))
    }
}
