//! Request Orchestrator
//!
//! [`AxonClient`] is the one entry point: it composes the eval URI, sends
//! it with the cached bearer token, refreshes the token after a 403 and
//! retries, and decodes the body of the first successful answer.
//!
//! ## Retry policy
//!
//! - 403: refresh through the [`TokenProvider`], retry with the new token
//! - any other failure: returned immediately, no retry
//! - `max_attempts` answers of 403 in a row: [`ClientError::RetriesExhausted`]

mod error;

pub use error::{ClientError, ClientResult};

use crate::auth::{AuthToken, TokenProvider};
use crate::config::{ClientConfig, Config};
use crate::grid::{
    Decoded, Grid, GridDecoder, MetadataTable, ResultFormat, ResultShape, TimeSeriesTable,
};
use crate::query::{AxonQuery, TagFilter};
use crate::transport::{classify, compose_uri, GridTransport, HttpOutcome, HttpTransport};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Client for one server
///
/// Owns its cached token; requests take `&mut self`, so a token refresh
/// never races another request on the same client.
pub struct AxonClient {
    base_url: String,
    max_attempts: u32,
    transport: Box<dyn GridTransport>,
    tokens: Arc<dyn TokenProvider>,
    token: AuthToken,
    decoder: GridDecoder,
}

impl AxonClient {
    /// Connect over HTTP using the resolved configuration
    pub async fn connect(config: &Config, tokens: Arc<dyn TokenProvider>) -> ClientResult<Self> {
        let transport = HttpTransport::new(&config.client)?;
        Self::with_transport(&config.host.address, &config.client, Box::new(transport), tokens)
            .await
    }

    /// Build a client over any transport
    ///
    /// Acquires a token first if the provider has none yet.
    pub async fn with_transport(
        base_url: &str,
        config: &ClientConfig,
        transport: Box<dyn GridTransport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> ClientResult<Self> {
        let token = match tokens.current() {
            Some(token) => token,
            None => {
                tracing::info!("No bearer token cached, acquiring one");
                tokens.refresh().await?;
                tokens.current().ok_or(ClientError::MissingToken)?
            }
        };

        tracing::info!(base_url, max_attempts = config.max_attempts, "Axon client ready");

        Ok(Self {
            base_url: base_url.to_string(),
            max_attempts: config.max_attempts.max(1),
            transport,
            tokens,
            token,
            decoder: GridDecoder::new()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Evaluate `query` and decode the answer
    pub async fn request(
        &mut self,
        query: &AxonQuery,
        format: ResultFormat,
        shape: ResultShape,
    ) -> ClientResult<Decoded> {
        let body = self.fetch(query, format).await?;
        Ok(self.decoder.decode(&body, format, shape)?)
    }

    /// `readAll` over a tag filter, rows as a metadata table
    pub async fn read_all(&mut self, filter: &TagFilter) -> ClientResult<MetadataTable> {
        let grid = self.fetch_grid(&filter.to_query()?).await?;
        Ok(self.decoder.decode_metadata(&grid))
    }

    /// Evaluate a history query into a series table
    ///
    /// `None` when the answer has no timestamp index.
    pub async fn his_read(&mut self, query: &AxonQuery) -> ClientResult<Option<TimeSeriesTable>> {
        let grid = self.fetch_grid(query).await?;
        Ok(self.decoder.decode_time_series(&grid).map(|(_, table)| table))
    }

    /// Like [`his_read`](Self::his_read), with the column metadata
    pub async fn his_read_with_meta(
        &mut self,
        query: &AxonQuery,
    ) -> ClientResult<Option<(MetadataTable, TimeSeriesTable)>> {
        let grid = self.fetch_grid(query).await?;
        Ok(self.decoder.decode_time_series(&grid))
    }

    async fn fetch_grid(&mut self, query: &AxonQuery) -> ClientResult<Grid> {
        let body = self.fetch(query, ResultFormat::Json).await?;
        Ok(Grid::from_json(&body)?)
    }

    /// Send until a non-403 answer; the successful body
    async fn fetch(&mut self, query: &AxonQuery, format: ResultFormat) -> ClientResult<String> {
        let uri = compose_uri(&self.base_url, query);
        let span = tracing::info_span!(
            "axon_request",
            request_id = %Uuid::new_v4(),
            accept = format.mime()
        );

        self.send_with_retry(uri, format).instrument(span).await
    }

    async fn send_with_retry(&mut self, uri: String, format: ResultFormat) -> ClientResult<String> {
        for attempt in 1..=self.max_attempts {
            tracing::debug!(attempt, uri = %uri, "Sending eval request");

            let result = self.transport.send(&uri, format, &self.token).await;

            match classify(result) {
                HttpOutcome::Success(body) => {
                    tracing::debug!(attempt, bytes = body.len(), "Eval request succeeded");
                    return Ok(body);
                }
                HttpOutcome::RetryAuth => {
                    tracing::warn!(attempt, "Bearer token rejected, refreshing");
                    self.refresh_token().await?;
                }
                HttpOutcome::Fatal(kind) => {
                    tracing::debug!(attempt, ?kind, "Eval request failed");
                    return Err(kind.into());
                }
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }

    async fn refresh_token(&mut self) -> ClientResult<()> {
        self.tokens.refresh().await?;
        self.token = self.tokens.current().ok_or(ClientError::MissingToken)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::transport::{GridResponse, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Sent = Arc<Mutex<Vec<(String, ResultFormat, String)>>>;

    /// Replays canned answers and records what was sent
    struct MockTransport {
        answers: Mutex<VecDeque<Result<GridResponse, TransportError>>>,
        sent: Sent,
    }

    impl MockTransport {
        fn new(answers: Vec<Result<GridResponse, TransportError>>) -> (Self, Sent) {
            let sent = Sent::default();
            let transport = Self {
                answers: Mutex::new(answers.into()),
                sent: sent.clone(),
            };
            (transport, sent)
        }
    }

    #[async_trait]
    impl GridTransport for MockTransport {
        async fn send(
            &self,
            uri: &str,
            format: ResultFormat,
            token: &AuthToken,
        ) -> Result<GridResponse, TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((uri.to_string(), format, token.as_str().to_string()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GridResponse::new(500, "no more answers")))
        }
    }

    /// Hands out `tok-0`, `tok-1`, ... one per refresh
    struct CountingProvider {
        current: Mutex<Option<AuthToken>>,
        refreshes: AtomicUsize,
        fail_refresh: bool,
    }

    impl CountingProvider {
        fn with_token() -> Arc<Self> {
            Arc::new(Self {
                current: Mutex::new(Some(AuthToken::new("tok-0"))),
                refreshes: AtomicUsize::new(0),
                fail_refresh: false,
            })
        }

        fn empty(fail_refresh: bool) -> Arc<Self> {
            Arc::new(Self {
                current: Mutex::new(None),
                refreshes: AtomicUsize::new(0),
                fail_refresh,
            })
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        fn current(&self) -> Option<AuthToken> {
            self.current.lock().unwrap().clone()
        }

        async fn refresh(&self) -> Result<(), AuthError> {
            if self.fail_refresh {
                return Err(AuthError::EmptyToken);
            }
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            *self.current.lock().unwrap() = Some(AuthToken::new(format!("tok-{}", n)));
            Ok(())
        }
    }

    const BASE: &str = "http://skyspark.test/api/demo/";

    async fn client(
        answers: Vec<Result<GridResponse, TransportError>>,
        provider: Arc<CountingProvider>,
    ) -> (AxonClient, Sent) {
        let (transport, sent) = MockTransport::new(answers);
        let client = AxonClient::with_transport(
            BASE,
            &ClientConfig::default(),
            Box::new(transport),
            provider,
        )
        .await
        .unwrap();
        (client, sent)
    }

    fn history_body() -> String {
        json!({
            "meta": {"ver": "3.0"},
            "cols": [{"name": "ts"}, {"name": "v0", "id": "r:p1 Temp"}, {"name": "v1", "id": "r:p2 Power"}],
            "rows": [
                {"ts": "t:2024-01-15T00:00:00-08:00 Los_Angeles", "v0": "n:70 °F", "v1": "n:1.5 kW"},
                {"ts": "t:2024-01-15T00:15:00-08:00 Los_Angeles", "v0": "n:71 °F", "v1": "n:1.6 kW"}
            ]
        })
        .to_string()
    }

    fn query() -> AxonQuery {
        AxonQuery::from("read(point and temp).hisRead(yesterday)")
    }

    #[tokio::test]
    async fn test_auth_retry_refreshes_once() {
        let provider = CountingProvider::with_token();
        let (mut client, sent) = client(
            vec![
                Ok(GridResponse::new(403, "")),
                Ok(GridResponse::new(200, history_body())),
            ],
            provider.clone(),
        )
        .await;

        let decoded = client
            .request(&query(), ResultFormat::Json, ResultShape::Ts)
            .await
            .unwrap();

        assert_eq!(provider.refreshes(), 1);
        match decoded {
            Decoded::TimeSeries(Some(table)) => {
                assert_eq!(table.len(), 2);
                assert_eq!(table.value(1, "r:p2 Power"), Some(1.6));
            }
            other => panic!("unexpected {:?}", other),
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].2, "tok-0");
        assert_eq!(sent[1].2, "tok-1");
        assert_eq!(sent[1].1, ResultFormat::Json);
        assert!(sent[1].0.starts_with("http://skyspark.test/api/demo/eval?expr=read%28point"));
    }

    #[tokio::test]
    async fn test_fatal_statuses_do_not_refresh() {
        for status in [400u16, 404, 406] {
            let provider = CountingProvider::with_token();
            let (mut client, sent) =
                client(vec![Ok(GridResponse::new(status, ""))], provider.clone()).await;

            let err = client
                .request(&query(), ResultFormat::Json, ResultShape::Meta)
                .await
                .unwrap_err();

            match status {
                400 => assert!(matches!(err, ClientError::MissingHeader)),
                404 => assert!(matches!(err, ClientError::InvalidUri)),
                _ => assert!(matches!(err, ClientError::UnsupportedMimeType)),
            }
            assert_eq!(provider.refreshes(), 0);
            assert_eq!(sent.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_empty_marker_is_empty_result() {
        let (mut client, _) = client(
            vec![Ok(GridResponse::new(200, "empty\n"))],
            CountingProvider::with_token(),
        )
        .await;

        let err = client
            .request(&query(), ResultFormat::Json, ResultShape::Ts)
            .await
            .unwrap_err();
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn test_exhausted_attempts_are_explicit() {
        let provider = CountingProvider::with_token();
        let forbidden = || -> Result<GridResponse, TransportError> { Ok(GridResponse::new(403, "")) };
        let (mut client, sent) =
            client(vec![forbidden(), forbidden(), forbidden()], provider.clone()).await;

        let err = client
            .request(&query(), ResultFormat::Json, ResultShape::Meta)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RetriesExhausted { attempts: 3 }));
        assert_eq!(sent.lock().unwrap().len(), 3);
        assert_eq!(provider.refreshes(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let provider = CountingProvider::with_token();
        let (mut client, sent) = client(
            vec![Err(TransportError::Connect("refused".into()))],
            provider.clone(),
        )
        .await;

        let err = client
            .request(&query(), ResultFormat::Json, ResultShape::Meta)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(TransportError::Connect(_))));
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_other_status_is_http_error() {
        let (mut client, _) = client(
            vec![Ok(GridResponse::new(500, "boom"))],
            CountingProvider::with_token(),
        )
        .await;

        let err = client
            .request(&query(), ResultFormat::Csv, ResultShape::Meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 500 }));
    }

    #[tokio::test]
    async fn test_construction_acquires_missing_token() {
        let provider = CountingProvider::empty(false);
        let (mut client, sent) = client(
            vec![Ok(GridResponse::new(200, "a,b\n1,2\n"))],
            provider.clone(),
        )
        .await;
        assert_eq!(provider.refreshes(), 1);

        let decoded = client
            .request(&query(), ResultFormat::Csv, ResultShape::Meta)
            .await
            .unwrap();
        assert_eq!(decoded, Decoded::Csv("a,b\n1,2\n".to_string()));
        assert_eq!(sent.lock().unwrap()[0].2, "tok-1");
    }

    #[tokio::test]
    async fn test_construction_fails_without_token() {
        let (transport, _) = MockTransport::new(Vec::new());
        let result = AxonClient::with_transport(
            BASE,
            &ClientConfig::default(),
            Box::new(transport),
            CountingProvider::empty(true),
        )
        .await;

        assert!(matches!(result, Err(ClientError::Auth(AuthError::EmptyToken))));
    }

    #[tokio::test]
    async fn test_read_all_sends_built_query() {
        let body = json!({
            "cols": [{"name": "id"}, {"name": "dis"}],
            "rows": [{"id": "r:a AHU-1", "dis": "AHU-1", "ahu": "m:"}]
        })
        .to_string();
        let (mut client, sent) = client(
            vec![Ok(GridResponse::new(200, body))],
            CountingProvider::with_token(),
        )
        .await;

        let filter = TagFilter::new().marker("ahu").without("disabled");
        let table = client.read_all(&filter).await.unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "dis"), Some(&json!("AHU-1")));
        assert_eq!(
            sent.lock().unwrap()[0].0,
            format!("{}eval?expr=readAll%28ahu%20and%20not%20disabled%29", BASE)
        );
    }

    #[tokio::test]
    async fn test_his_read_without_index_is_none() {
        let body = json!({
            "cols": [{"name": "ts"}, {"name": "v0", "id": "r:a"}],
            "rows": [{"v0": "n:1"}]
        })
        .to_string();
        let (mut client, _) = client(
            vec![Ok(GridResponse::new(200, body))],
            CountingProvider::with_token(),
        )
        .await;

        assert!(client.his_read(&query()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_his_read_with_meta() {
        let (mut client, _) = client(
            vec![Ok(GridResponse::new(200, history_body()))],
            CountingProvider::with_token(),
        )
        .await;

        let (meta, table) = client.his_read_with_meta(&query()).await.unwrap().unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(table.column_names(), &["r:p1 Temp".to_string(), "r:p2 Power".to_string()]);
    }
}
