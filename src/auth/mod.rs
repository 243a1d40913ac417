//! Authorization
//!
//! The server authorizes every request with a bearer token. How that token
//! is obtained is someone else's business: the client only ever asks a
//! [`TokenProvider`] for the current token and, after a 403, asks it to
//! refresh.
//!
//! ## Providers
//!
//! - [`StaticTokenProvider`]: a fixed token (environment, tests)
//! - [`FileTokenProvider`]: a token cached in a file, refreshed by re-reading
//!   it or by running an external login command

mod providers;

pub use providers::{provider_from_config, FileTokenProvider, StaticTokenProvider};

use async_trait::async_trait;
use thiserror::Error;

/// Opaque bearer credential
///
/// Valid until the server rejects it. The value never shows up in `Debug`
/// output so it can't leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the authorization header
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `authorization` header carrying this token
    pub fn header_value(&self) -> String {
        format!("BEARER authToken={}", self.0)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

impl From<&str> for AuthToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The token currently held, if any
    fn current(&self) -> Option<AuthToken>;

    /// Acquire a fresh token, replacing the one held
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// Errors raised while acquiring a token
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token file {path:?}: {error}")]
    Io {
        path: std::path::PathBuf,
        error: String,
    },

    #[error("Refresh command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Token source returned an empty token")]
    EmptyToken,
}
