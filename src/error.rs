use thiserror::Error;

/// Transport-level failure reported by a [`crate::Transceiver`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The tag gave no reply within the exchange timeout
    #[error("no reply from tag within the exchange timeout")]
    Timeout,
    /// The tag left the field or the reader failed
    #[error("link lost: {0}")]
    Lost(String),
    /// The session owning the link was closed
    #[error("link closed")]
    Closed,
    /// A reply failed its integrity check
    #[error("corrupted frame: {0}")]
    Corrupted(String),
}

/// Terminal outcome of a tag session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(LinkError),
    #[error("timed out waiting for the tag")]
    Timeout,
    #[error("unsupported device: {0}")]
    UnsupportedDevice(String),
    #[error("data loss: expected {expected} bytes, got {actual}")]
    DataLoss { expected: usize, actual: usize },
    #[error("operation not allowed in state {actual:?}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: crate::SessionState,
    },
}

impl From<LinkError> for SessionError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Timeout => SessionError::Timeout,
            other => SessionError::Link(other),
        }
    }
}

#[test]
fn test_link_timeout_maps_to_session_timeout() {
    assert_eq!(SessionError::from(LinkError::Timeout), SessionError::Timeout);
    assert_eq!(
        SessionError::from(LinkError::Closed),
        SessionError::Link(LinkError::Closed)
    );
}
