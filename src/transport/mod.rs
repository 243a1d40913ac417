//! Grid Transport
//!
//! Everything between an Axon expression and an HTTP status:
//!
//! - [`compose_uri`]: the eval endpoint URI for a query
//! - [`GridTransport`]: one authorized GET (reqwest in production,
//!   scripted in tests)
//! - [`classify`]: maps the response to an [`HttpOutcome`]

mod http;

pub use http::HttpTransport;

use crate::auth::AuthToken;
use crate::grid::ResultFormat;
use crate::query::AxonQuery;
use async_trait::async_trait;
use thiserror::Error;

/// Body the server sends with a 200 when a query matched nothing
pub const EMPTY_RESULT_MARKER: &str = "empty\n";

/// Eval endpoint URI for `query` under `base_url`
///
/// The expression is percent-encoded into `eval?expr=`. A base URL without
/// a trailing `/` gets one.
pub fn compose_uri(base_url: &str, query: &AxonQuery) -> String {
    let separator = if base_url.ends_with('/') { "" } else { "/" };
    format!(
        "{}{}eval?expr={}",
        base_url,
        separator,
        urlencoding::encode(query.as_str())
    )
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridResponse {
    pub status: u16,
    pub body: String,
}

impl GridResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The request never produced an HTTP status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Sends one authorized GET
#[async_trait]
pub trait GridTransport: Send + Sync {
    /// GET `uri` with `authorization: BEARER authToken=<token>` and
    /// `accept: <format mime>`
    async fn send(
        &self,
        uri: &str,
        format: ResultFormat,
        token: &AuthToken,
    ) -> Result<GridResponse, TransportError>;
}

/// Why a request failed for good
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// 200 with the empty-result marker: the query matched nothing
    EmptyResult,
    /// 400
    MissingHeader,
    /// 404
    InvalidUri,
    /// 406
    UnsupportedMimeType,
    /// Any other non-200 status
    Http { status: u16 },
    /// No HTTP response at all
    Transport(TransportError),
}

/// Classified result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// 200 with a decodable body
    Success(String),
    /// 403: refresh the token and try again
    RetryAuth,
    /// Not worth retrying
    Fatal(FailureKind),
}

/// Classify the result of [`GridTransport::send`]
pub fn classify(result: Result<GridResponse, TransportError>) -> HttpOutcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => return HttpOutcome::Fatal(FailureKind::Transport(e)),
    };

    match response.status {
        200 if response.body == EMPTY_RESULT_MARKER => HttpOutcome::Fatal(FailureKind::EmptyResult),
        200 => HttpOutcome::Success(response.body),
        400 => HttpOutcome::Fatal(FailureKind::MissingHeader),
        403 => HttpOutcome::RetryAuth,
        404 => HttpOutcome::Fatal(FailureKind::InvalidUri),
        406 => HttpOutcome::Fatal(FailureKind::UnsupportedMimeType),
        status => HttpOutcome::Fatal(FailureKind::Http { status }),
    }
}
