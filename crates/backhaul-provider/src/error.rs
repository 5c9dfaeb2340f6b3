//! Error taxonomy for the provider contract

use thiserror::Error;

/// Rejection of a connection tuple before any network work happens.
///
/// Raised synchronously from `add_connection`/`remove_connection`; retrying
/// with the same input will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("UDP is not supported")]
    UdpUnsupported,
}

/// Malformed provider configuration string.
///
/// Raised synchronously from construction or the static config check, never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Configuration is not valid JSON")]
    NotJson,

    #[error("{field} field is missing or not a {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn invalid_field(field: &'static str, expected: &'static str) -> Self {
        ConfigError::InvalidField { field, expected }
    }
}

/// Failure of a mutating provider operation.
///
/// Lifecycle failures (`start`/`stop`) are reported as boolean returns plus a
/// log entry instead; nothing here is fatal to the hosting process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Provider is not started")]
    NotStarted,

    #[error("Session reconnect is in progress, retry shortly")]
    Reconnecting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message_names_the_field() {
        let err = ConfigError::invalid_field("port", "number");
        assert_eq!(err.to_string(), "port field is missing or not a number");
    }

    #[test]
    fn validation_error_converts_into_provider_error() {
        let err: ProviderError = ValidationError::UdpUnsupported.into();
        assert_eq!(err, ProviderError::Validation(ValidationError::UdpUnsupported));
        assert_eq!(err.to_string(), "UDP is not supported");
    }
}
