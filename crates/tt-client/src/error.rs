// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a usable response (refused, reset, timeout).
    #[error("request failed: {0}")]
    Http(String),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation reached the backend and was rejected there; the message
    /// is the backend's own error text.
    #[error("{0}")]
    Remote(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Serialization(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
