//! Tunnel provider capability contract
//!
//! Defines the types and traits every tunnel transport implements: the data
//! model for forwarding rules and connected clients, parameter validation,
//! the append-only event log, and the string-keyed provider registry used to
//! resolve a concrete transport at configuration-load time.

pub mod check;
pub mod error;
pub mod log;
pub mod noop;
pub mod provider;
pub mod registry;
pub mod types;

pub use check::{check_connection_parameters, validate_connection_parameters, CheckResult};
pub use error::{ConfigError, ProviderError, ValidationError};
pub use log::{EventLog, LogEntry};
pub use noop::{NoopFactory, NoopProvider};
pub use provider::TunnelProvider;
pub use registry::{ProviderFactory, ProviderRegistry};
pub use types::{ConnectedClient, ForwardRule, Protocol, ProviderState, RuleKey};
