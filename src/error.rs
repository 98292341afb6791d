//! Custom error types for the client.
//!
//! `IxeError` is the single error type of the library. It separates three
//! families of failures:
//!
//! - **Remote failures** (`Remote`): the Tcl server rejected a command, either
//!   with a Tcl error or with a non-zero IxTclHal return code. The command is
//!   not retried and earlier steps of a multi-step sequence are not undone.
//! - **Client-side validation** (`ReadOnlyAttribute`, `UnknownAttribute`,
//!   `InvalidValue`, `UnsupportedFormat`): detected before anything is sent.
//! - **Unsupported mode** (`UnsupportedApi`): the caller asked for a protocol
//!   variant this client does not implement.
//!
//! Transport and configuration problems are wrapped with `#[from]` so that `?`
//! works across the crate.

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias for results using the client error type.
pub type AppResult<T> = std::result::Result<T, IxeError>;

/// Errors raised by the client.
#[derive(Error, Debug)]
pub enum IxeError {
    /// A Tcl command returned an error or a non-zero code.
    #[error("Remote command '{command}' failed: {message}")]
    Remote { command: String, message: String },

    /// Write to a read-only attribute.
    #[error("Attribute '{0}' is read-only")]
    ReadOnlyAttribute(String),

    /// The object type has no such attribute.
    #[error("Unknown attribute '{attribute}' for '{object}'")]
    UnknownAttribute { object: String, attribute: String },

    /// A value does not fit the attribute type.
    #[error("Invalid value for '{attribute}': {reason}")]
    InvalidValue { attribute: String, reason: String },

    /// Unknown profile file suffix.
    #[error("Configuration file type '{0}' not supported")]
    UnsupportedFormat(String),

    /// API variant not implemented.
    #[error("{0} API not supported in this version")]
    UnsupportedApi(String),

    /// Call issued before connecting.
    #[error("Tcl server not connected")]
    NotConnected,

    /// Reply that could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A port was selected that the session does not own.
    #[error("Port '{0}' is not reserved")]
    PortNotReserved(String),

    /// No ports were selected and none are reserved.
    #[error("No ports selected and none reserved")]
    NoPorts,

    /// Transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IxeError {
    /// Build a remote failure for `command`.
    pub fn remote(command: impl Into<String>, message: impl Into<String>) -> Self {
        IxeError::Remote {
            command: command.into(),
            message: message.into(),
        }
    }

    /// True when the error was raised before anything reached the instrument.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IxeError::ReadOnlyAttribute(_)
                | IxeError::UnknownAttribute { .. }
                | IxeError::InvalidValue { .. }
                | IxeError::UnsupportedFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IxeError::remote("port write 1 1 1", "rc=1");
        assert_eq!(
            err.to_string(),
            "Remote command 'port write 1 1 1' failed: rc=1"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(IxeError::ReadOnlyAttribute("linkState".into()).is_validation());
        assert!(IxeError::UnsupportedFormat(".cfg".into()).is_validation());
        assert!(!IxeError::NotConnected.is_validation());
        assert!(!IxeError::remote("x", "y").is_validation());
    }
}
