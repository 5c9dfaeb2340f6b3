//! No-op provider: a transportless test double for the capability contract
//!
//! Keeps a real rule store so contract semantics (tuple idempotency, disable
//! on remove) can be exercised without any network, but never opens a session
//! and never relays a byte.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::check::{validate_connection_parameters, CheckResult};
use crate::error::{ConfigError, ProviderError};
use crate::log::{EventLog, LogEntry};
use crate::provider::TunnelProvider;
use crate::registry::ProviderFactory;
use crate::types::{ConnectedClient, ForwardRule, Protocol, ProviderState, RuleKey};

/// Provider that accepts every lifecycle call and relays nothing
#[derive(Debug, Default)]
pub struct NoopProvider {
    state: RwLock<ProviderState>,
    rules: RwLock<Vec<ForwardRule>>,
    logs: EventLog,
}

impl NoopProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ProviderState::Stopped),
            rules: RwLock::new(Vec::new()),
            logs: EventLog::new(),
        }
    }
}

#[async_trait]
impl TunnelProvider for NoopProvider {
    async fn start(&self) -> bool {
        *self.state.write().unwrap() = ProviderState::Started;
        self.logs.record("Started noop provider");
        debug!("noop provider started");
        true
    }

    async fn stop(&self) -> bool {
        self.rules.write().unwrap().clear();
        *self.state.write().unwrap() = ProviderState::Stopped;
        self.logs.record("Stopped noop provider");
        debug!("noop provider stopped");
        true
    }

    async fn add_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError> {
        validate_connection_parameters(source_ip, source_port, dest_port, protocol)?;

        let key = RuleKey::new(source_ip, source_port, dest_port);
        let mut rules = self.rules.write().unwrap();
        if rules.iter().any(|rule| rule.key == key) {
            return Ok(());
        }
        rules.push(ForwardRule::new(key, protocol));
        Ok(())
    }

    async fn remove_connection(
        &self,
        source_ip: &str,
        source_port: u16,
        dest_port: u16,
        protocol: Protocol,
    ) -> Result<(), ProviderError> {
        validate_connection_parameters(source_ip, source_port, dest_port, protocol)?;

        let key = RuleKey::new(source_ip, source_port, dest_port);
        let mut rules = self.rules.write().unwrap();
        if let Some(rule) = rules.iter_mut().find(|rule| rule.key == key) {
            rule.enabled = false;
        }
        Ok(())
    }

    fn connections(&self) -> Vec<ConnectedClient> {
        Vec::new()
    }

    fn rules(&self) -> Vec<ForwardRule> {
        self.rules.read().unwrap().clone()
    }

    fn state(&self) -> ProviderState {
        *self.state.read().unwrap()
    }

    fn logs(&self) -> Vec<LogEntry> {
        self.logs.snapshot()
    }
}

/// Factory registering the no-op provider under `"noop"`
pub struct NoopFactory;

impl ProviderFactory for NoopFactory {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn check_config(&self, _raw: &str) -> CheckResult {
        CheckResult::ok()
    }

    fn create(&self, _raw: &str) -> Result<Arc<dyn TunnelProvider>, ConfigError> {
        Ok(Arc::new(NoopProvider::new()))
    }
}
