//! reqwest-backed transport

use super::{GridResponse, GridTransport, TransportError};
use crate::auth::AuthToken;
use crate::config::ClientConfig;
use crate::grid::ResultFormat;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;

/// HTTP transport over a shared reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the configured request timeout
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("axon-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl GridTransport for HttpTransport {
    async fn send(
        &self,
        uri: &str,
        format: ResultFormat,
        token: &AuthToken,
    ) -> Result<GridResponse, TransportError> {
        let response = self
            .client
            .get(uri)
            .header(AUTHORIZATION, token.header_value())
            .header(ACCEPT, format.mime())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(GridResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_default_config() {
        assert!(HttpTransport::new(&ClientConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let config = ClientConfig {
            request_timeout_secs: 2,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();

        // Port 9 (discard) on localhost is closed on test machines
        let result = transport
            .send(
                "http://127.0.0.1:9/api/demo/eval?expr=now%28%29",
                ResultFormat::Json,
                &AuthToken::new("t"),
            )
            .await;

        assert!(result.is_err());
    }
}
