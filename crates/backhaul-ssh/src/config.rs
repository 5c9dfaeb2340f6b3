//! Provider configuration parsed from the opaque JSON string
//!
//! The external routing layer hands providers a single configuration string.
//! Parsing checks each field in a fixed order and reports the first problem,
//! so the static config check and construction always agree on the message
//! for a given input.

use serde::Serialize;
use serde_json::Value;

use backhaul_provider::{CheckResult, ConfigError};

/// Connection settings for the SSH transport
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshProviderConfig {
    /// Remote host to establish the session with.
    pub ip: String,
    /// SSH port on the remote host.
    pub port: u16,
    pub username: String,
    /// Private key material in OpenSSH or PEM form.
    pub private_key: String,
    /// Addresses the remote listeners bind to.
    pub listen_on_ips: Vec<String>,
}

fn default_listen_ips() -> Vec<String> {
    vec!["0.0.0.0".to_string()]
}

impl SshProviderConfig {
    /// Parses a configuration string, reporting the first invalid field.
    ///
    /// `listenOnIPs` is optional and defaults to `["0.0.0.0"]` when absent
    /// or not an array. Construction never opens a network connection.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| ConfigError::NotJson)?;

        let ip = value
            .get("ip")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::invalid_field("ip", "string"))?
            .to_string();

        let port = value
            .get("port")
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| ConfigError::invalid_field("port", "number"))?;

        let username = value
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::invalid_field("username", "string"))?
            .to_string();

        let private_key = value
            .get("privateKey")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::invalid_field("privateKey", "string"))?
            .to_string();

        let listen_on_ips = match value.get("listenOnIPs") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => default_listen_ips(),
        };

        Ok(Self {
            ip,
            port,
            username,
            private_key,
            listen_on_ips,
        })
    }

    /// `parse` in the `{success, message}` shape of the static check.
    pub fn check(raw: &str) -> CheckResult {
        match Self::parse(raw) {
            Ok(_) => CheckResult::ok(),
            Err(err) => CheckResult::failure(err.to_string()),
        }
    }
}

impl std::fmt::Debug for SshProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshProviderConfig")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key", &"<redacted>")
            .field("listen_on_ips", &self.listen_on_ips)
            .finish()
    }
}
