use thiserror::Error;

/// Faults raised at the connection boundary.
///
/// `Decode` is recoverable: the offending frame is dropped and the session
/// keeps running. Everything else ends the session locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode server frame: {0}")]
    Decode(String),

    #[error("server rejected authentication")]
    AuthenticationRejected,

    #[error("server did not acknowledge authentication in time")]
    AuthenticationTimeout,

    #[error("connection is closed")]
    NotConnected,
}

impl SessionError {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Decode(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Transport(error.to_string())
    }
}
