//! Client error types
//!
//! One enum for everything a request can end in. Transport-level fatal
//! outcomes map one-to-one onto variants; authorization failures only
//! surface once the token can't be refreshed or the attempts run out.

use crate::auth::AuthError;
use crate::grid::GridError;
use crate::query::QueryError;
use crate::transport::{FailureKind, TransportError};
use thiserror::Error;

/// Errors returned by [`AxonClient`](super::AxonClient)
#[derive(Error, Debug)]
pub enum ClientError {
    /// The query matched nothing (or was malformed in a way the server
    /// reports the same way)
    #[error("Empty result, check query")]
    EmptyResult,

    #[error("HTTP request is missing a required header")]
    MissingHeader,

    #[error("URI does not map to a valid operation URI")]
    InvalidUri,

    #[error("Unsupported MIME type requested")]
    UnsupportedMimeType,

    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    /// The token provider has no token, even after a refresh
    #[error("No bearer token available")]
    MissingToken,

    /// Every attempt was answered with 403
    #[error("Still unauthorized after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Decode error: {0}")]
    Decode(#[from] GridError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

impl ClientError {
    /// True for the "query matched nothing" outcome, which callers usually
    /// treat as an empty answer rather than a failure
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ClientError::EmptyResult)
    }
}

impl From<FailureKind> for ClientError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::EmptyResult => ClientError::EmptyResult,
            FailureKind::MissingHeader => ClientError::MissingHeader,
            FailureKind::InvalidUri => ClientError::InvalidUri,
            FailureKind::UnsupportedMimeType => ClientError::UnsupportedMimeType,
            FailureKind::Http { status } => ClientError::Http { status },
            FailureKind::Transport(e) => ClientError::Transport(e),
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ClientError::EmptyResult.to_string(),
            "Empty result, check query"
        );
        assert_eq!(
            ClientError::Http { status: 502 }.to_string(),
            "HTTP error: 502"
        );
    }

    #[test]
    fn test_failure_kind_conversion() {
        let err: ClientError = FailureKind::UnsupportedMimeType.into();
        assert!(matches!(err, ClientError::UnsupportedMimeType));

        let err: ClientError = FailureKind::EmptyResult.into();
        assert!(err.is_empty_result());
    }
}
