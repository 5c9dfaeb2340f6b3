//! Static parameter checks exposed at the external boundary

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::Protocol;

/// Outcome of a static parameter check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    /// A passing check with no message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A failing check with a descriptive message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Validates a connection tuple for any session-based transport.
///
/// The only rule is that UDP cannot be carried; TCP passes unconditionally,
/// independent of the IP and port values.
pub fn validate_connection_parameters(
    _source_ip: &str,
    _source_port: u16,
    _dest_port: u16,
    protocol: Protocol,
) -> Result<(), ValidationError> {
    match protocol {
        Protocol::Udp => Err(ValidationError::UdpUnsupported),
        Protocol::Tcp => Ok(()),
    }
}

/// `validate_connection_parameters` in the `{success, message}` shape the
/// external routing layer consumes.
pub fn check_connection_parameters(
    source_ip: &str,
    source_port: u16,
    dest_port: u16,
    protocol: Protocol,
) -> CheckResult {
    match validate_connection_parameters(source_ip, source_port, dest_port, protocol) {
        Ok(()) => CheckResult::ok(),
        Err(err) => CheckResult::failure(err.to_string()),
    }
}
