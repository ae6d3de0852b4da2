//! Error types for the BlueChip client engine.

use thiserror::Error;

/// The main error type for BlueChip.
#[derive(Error, Debug)]
pub enum Error {
    /// The server rejected the credential (HTTP 401). The session is cleared as a side effect.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Validation or business-rule rejection from the server (4xx other than 401).
    #[error("{message}")]
    Client { status: u16, message: String },

    /// Server-side failure (5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Transport failure (connection refused, timeout, DNS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input rejected before any request was issued
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Alias for Result with our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a new client error.
    pub fn client(status: u16, msg: impl Into<String>) -> Self {
        Self::Client {
            status,
            message: msg.into(),
        }
    }

    /// Create a new server error.
    pub fn server(status: u16, msg: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: msg.into(),
        }
    }

    /// Create a new network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if this error is transient (resolved by the next refresh or a manual retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// Check if this error ended the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Message suitable for showing to the user who triggered the failing action.
    ///
    /// Client errors carry the server's message verbatim; transient failures
    /// collapse to a generic notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::Client { message, .. } => message.clone(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Unauthorized(_) => "Session expired, please log in again".to_string(),
            Self::Server { .. } | Self::Network(_) => {
                "Market is unreachable right now, try again shortly".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_displays_server_message_verbatim() {
        let err = Error::client(400, "Insufficient funds");
        assert_eq!(err.to_string(), "Insufficient funds");
        assert_eq!(err.user_message(), "Insufficient funds");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transient_errors_are_recoverable() {
        assert!(Error::network("connection refused").is_recoverable());
        assert!(Error::server(502, "bad gateway").is_recoverable());
        assert!(!Error::unauthorized("expired").is_recoverable());
        assert!(Error::unauthorized("expired").is_unauthorized());
    }
}
