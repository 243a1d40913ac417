//! # axon-client
//!
//! Client for building-data servers that evaluate Axon expressions over
//! HTTP and answer with grids.
//!
//! ## Features
//!
//! - **Query building**: tag filters rendered as `readAll(...)` expressions
//! - **Token handling**: bearer token cached per client, refreshed and
//!   retried after a 403
//! - **Error classification**: every HTTP outcome maps to a typed error
//! - **Grid decoding**: metadata tables and timestamp-indexed numeric series
//!
//! ## Modules
//!
//! - [`query`]: Axon expressions and the tag filter builder
//! - [`auth`]: bearer tokens and token providers
//! - [`transport`]: URI composition, HTTP send, status classification
//! - [`grid`]: typed scalars, tables and the grid decoder
//! - [`client`]: the request orchestrator
//! - [`config`]: configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axon_client::{provider_from_config, AxonClient, AxonQuery, Config, TagFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let tokens = provider_from_config(&config.auth);
//!     let mut client = AxonClient::connect(&config, tokens).await?;
//!
//!     // Metadata for every AHU on a site
//!     let filter = TagFilter::new().marker("ahu").with("siteRef", "p:demo:r:1eeb");
//!     let ahus = client.read_all(&filter).await?;
//!     println!("Found {} AHUs", ahus.len());
//!
//!     // Yesterday's discharge temperatures
//!     let query = AxonQuery::from("read(discharge and air and temp and sensor)")
//!         .his_read("yesterday");
//!     if let Some(series) = client.his_read(&query).await? {
//!         println!("{} samples across {} series", series.len(), series.column_names().len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod grid;
pub mod query;
pub mod transport;

// Re-export top-level types for convenience
pub use auth::{
    provider_from_config, AuthError, AuthToken, FileTokenProvider, StaticTokenProvider,
    TokenProvider,
};

pub use client::{AxonClient, ClientError, ClientResult};

pub use config::{
    generate_default_config, AuthConfig, ClientConfig, Config, ConfigError, HostConfig,
    LoggingConfig,
};

pub use grid::{
    repair_csv, Decoded, Grid, GridColumn, GridDecoder, GridError, MetadataTable, ResultFormat,
    ResultShape, Scalar, TimeSeriesTable,
};

pub use query::{AxonQuery, FilterValue, QueryError, TagFilter};

pub use transport::{
    classify, compose_uri, FailureKind, GridResponse, GridTransport, HttpOutcome, HttpTransport,
    TransportError,
};
