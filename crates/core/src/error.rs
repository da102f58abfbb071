//! Error types for gatechat-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Not connected")]
    NotConnected,

    /// Non-success status reported by the gateway.
    #[error("Gateway returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    ProtocolVersionMismatch { expected: u32, got: u32 },

    #[error("Invalid handshake message")]
    InvalidHandshake,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Build a gateway status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Status code carried by this error, if any.
    ///
    /// Authentication failures report 401 even when the gateway closed the
    /// handshake without an explicit status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CoreError::Status { status, .. } => Some(*status),
            CoreError::AuthFailed => Some(401),
            _ => None,
        }
    }

    /// True for errors carrying an authorization or permission status.
    pub fn is_authorization(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
    }
}

impl From<quinn::ConnectionError> for CoreError {
    fn from(err: quinn::ConnectionError) -> Self {
        use quinn::ConnectionError;
        match err {
            ConnectionError::TimedOut => CoreError::Timeout(0),
            ConnectionError::Reset => CoreError::ConnectionReset(err.to_string()),
            ConnectionError::ConnectionClosed(_)
            | ConnectionError::ApplicationClosed(_)
            | ConnectionError::LocallyClosed => CoreError::ConnectionClosed,
            other => CoreError::Connection(other.to_string()),
        }
    }
}

impl From<quinn::ConnectError> for CoreError {
    fn from(err: quinn::ConnectError) -> Self {
        CoreError::Connection(format!("Failed to initiate connection: {}", err))
    }
}

impl From<quinn::WriteError> for CoreError {
    fn from(err: quinn::WriteError) -> Self {
        CoreError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, err))
    }
}

impl From<quinn::ReadError> for CoreError {
    fn from(err: quinn::ReadError) -> Self {
        CoreError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, err))
    }
}

impl From<quinn::ReadExactError> for CoreError {
    fn from(err: quinn::ReadExactError) -> Self {
        match err {
            quinn::ReadExactError::FinishedEarly(_) => CoreError::ConnectionClosed,
            quinn::ReadExactError::ReadError(e) => e.into(),
        }
    }
}
