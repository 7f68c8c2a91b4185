//! Error types for the remote authority.

use syncbox_protocol::CodecError;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors a request to the remote authority can end with.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Malformed or oversized request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request body could not be decoded or response encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No endpoint at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authority is not reachable.
    #[error("service unavailable")]
    Unavailable,

    /// Injected whole-batch failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RemoteError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RemoteError::InvalidRequest(_) | RemoteError::Codec(_) | RemoteError::NotFound(_)
        )
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RemoteError::InvalidRequest(_) | RemoteError::Codec(_) => 400,
            RemoteError::NotFound(_) => 404,
            RemoteError::Unavailable => 503,
            RemoteError::Internal(_) => 500,
        }
    }
}
