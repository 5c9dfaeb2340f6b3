//! Core data model shared by all tunnel providers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transport protocol requested for a forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// Identity of a forwarding rule within one provider instance.
///
/// `source_ip:source_port` is the private destination traffic is delivered
/// to; `dest_port` is the remote port the tunnel listens on. The naming is
/// counter-intuitive but fixed by the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    pub source_ip: String,
    pub source_port: u16,
    pub dest_port: u16,
}

impl RuleKey {
    pub fn new(source_ip: impl Into<String>, source_port: u16, dest_port: u16) -> Self {
        Self {
            source_ip: source_ip.into(),
            source_port,
            dest_port,
        }
    }
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} (remote port {})",
            self.source_ip, self.source_port, self.dest_port
        )
    }
}

/// One forwarding rule owned by a provider instance.
///
/// Rules are never deleted by the core, only disabled; at most one rule
/// exists per key at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRule {
    pub key: RuleKey,
    pub protocol: Protocol,
    pub enabled: bool,
}

impl ForwardRule {
    /// Creates an enabled rule for the given key.
    pub fn new(key: RuleKey, protocol: Protocol) -> Self {
        Self {
            key,
            protocol,
            enabled: true,
        }
    }
}

/// One live relayed connection, read-only to external observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedClient {
    /// Registry identity, used to remove the entry when the relay ends.
    pub id: Uuid,
    /// Remote peer address as reported by the tunnel.
    pub ip: String,
    /// Remote peer port as reported by the tunnel.
    pub port: u16,
    /// The rule this connection was accepted under (lookup, not ownership).
    pub rule: RuleKey,
}

impl ConnectedClient {
    pub fn new(ip: impl Into<String>, port: u16, rule: RuleKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip: ip.into(),
            port,
            rule,
        }
    }
}

/// Lifecycle state of a provider instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl Default for ProviderState {
    fn default() -> Self {
        ProviderState::Stopped
    }
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Stopped => write!(f, "stopped"),
            ProviderState::Starting => write!(f, "starting"),
            ProviderState::Started => write!(f, "started"),
            ProviderState::Stopping => write!(f, "stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_round_trips_through_lowercase_literals() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::Udp.to_string(), "udp");
        assert!("icmp".parse::<Protocol>().is_err());
    }

    #[test]
    fn protocol_serializes_as_boundary_strings() {
        assert_eq!(serde_json::to_string(&Protocol::Tcp).unwrap(), "\"tcp\"");
        assert_eq!(serde_json::to_string(&Protocol::Udp).unwrap(), "\"udp\"");
        let parsed: Protocol = serde_json::from_str("\"tcp\"").unwrap();
        assert_eq!(parsed, Protocol::Tcp);
    }

    #[test]
    fn rule_keys_compare_by_tuple() {
        let a = RuleKey::new("10.0.0.5", 22, 2222);
        let b = RuleKey::new("10.0.0.5", 22, 2222);
        let c = RuleKey::new("10.0.0.5", 22, 2223);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn new_rules_start_enabled() {
        let rule = ForwardRule::new(RuleKey::new("10.0.0.5", 22, 2222), Protocol::Tcp);
        assert!(rule.enabled);
    }

    #[test]
    fn connected_clients_get_unique_ids() {
        let key = RuleKey::new("10.0.0.5", 22, 2222);
        let a = ConnectedClient::new("203.0.113.9", 50000, key.clone());
        let b = ConnectedClient::new("203.0.113.9", 50000, key);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn provider_state_displays_lowercase() {
        assert_eq!(ProviderState::Stopped.to_string(), "stopped");
        assert_eq!(ProviderState::Starting.to_string(), "starting");
        assert_eq!(ProviderState::Started.to_string(), "started");
        assert_eq!(ProviderState::Stopping.to_string(), "stopping");
    }
}
