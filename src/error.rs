//! Error types for the session core

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by session lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Registration or connection to the signaling server failed
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Data channel failed to open
    #[error("Peer connect error: {0}")]
    PeerConnect(String),

    /// Media negotiation failed
    #[error("Call error: {0}")]
    Call(String),

    /// Caller broke an operation contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The data connection closed before the awaited event fired
    #[error("Connection closed")]
    ConnectionClosed,

    /// The media collaborator could not capture a stream
    #[error("Media error: {0}")]
    Media(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Contract violations indicate a caller bug and are never retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if a later lifecycle attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Signaling(_) | Error::PeerConnect(_) | Error::Call(_) | Error::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("waitClose before connection".to_string());
        assert_eq!(err.to_string(), "Protocol error: waitClose before connection");
        assert_eq!(Error::ConnectionClosed.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::Protocol("x".into()).is_fatal());
        assert!(!Error::Protocol("x".into()).is_retryable());
        assert!(Error::Signaling("ID is taken".into()).is_retryable());
        assert!(Error::ConnectionClosed.is_retryable());
        assert!(!Error::Config("x".into()).is_retryable());
    }
}
