//! Capability providers that execute network effects for the shell.
//!
//! # Architecture
//!
//! The engine never talks to a transport library directly. It holds a
//! [`Capabilities`] bundle of two trait objects:
//!
//! - [`HttpProvider`] - one request in, one [`HttpResponse`] out
//! - [`SseProvider`] - one subscription in, a [`ChunkStream`] of lines out
//!
//! [`http::ReqwestHttp`] and [`sse::ReqwestSse`] are the production
//! implementations. Tests substitute their own.
//!
//! # Error Handling
//!
//! Any HTTP status is a valid response, including 4xx and 5xx: only failures
//! that prevent a status from being produced surface as [`TransportError`].
//! SSE subscriptions retry connection establishment per [`ConnectPolicy`];
//! once a stream is established it is never reconnected.

pub mod http;
pub mod retry;
pub mod sse;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::Stream;
use reqwest::{Client, ClientBuilder};

pub use retry::ConnectPolicy;
pub use tether_types;
pub(crate) use tether_types::{HttpRequest, HttpResponse, SseRequest};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Future returned by provider calls.
pub type ProviderFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Lines read from an established SSE stream, each already framed as a chunk.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Connecting to {url} failed after {attempts} attempts: {source}")]
    Connect {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("Stream {url} rejected with status {status} after {attempts} attempts")]
    Rejected {
        url: String,
        status: u16,
        attempts: u32,
    },
    #[error("Stream {url} sent a line longer than {limit} bytes")]
    LineTooLong { url: String, limit: usize },
    #[error("Stream {url} broke: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Executes one HTTP request per call.
pub trait HttpProvider: Send + Sync {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> ProviderFut<'a, HttpResponse>;
}

/// Opens a long-lived server-sent-events stream per call.
pub trait SseProvider: Send + Sync {
    fn subscribe<'a>(&'a self, request: &'a SseRequest) -> ProviderFut<'a, ChunkStream>;
}

/// Transport tuning for one-shot HTTP effects.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub pool_idle_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            tcp_keepalive: Duration::from_secs(DEFAULT_TCP_KEEPALIVE_SECS),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT_SECS),
        }
    }
}

/// The providers the effect executor dispatches to.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpProvider>,
    pub sse: Arc<dyn SseProvider>,
}

impl Capabilities {
    #[must_use]
    pub fn new(http: Arc<dyn HttpProvider>, sse: Arc<dyn SseProvider>) -> Self {
        Self { http, sse }
    }

    /// reqwest-backed providers.
    pub fn reqwest(http: &HttpSettings, sse: &ConnectPolicy) -> Result<Self, TransportError> {
        Ok(Self {
            http: Arc::new(http::ReqwestHttp::new(http)?),
            sse: Arc::new(sse::ReqwestSse::new(sse.clone())?),
        })
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

fn base_client_builder() -> ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("tether/", env!("CARGO_PKG_VERSION"))),
    );

    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(5))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .default_headers(default_headers)
}

pub(crate) fn build_http_client(settings: &HttpSettings) -> Result<Client, TransportError> {
    base_client_builder()
        .connect_timeout(settings.connect_timeout)
        .tcp_keepalive(Some(settings.tcp_keepalive))
        .pool_idle_timeout(Some(settings.pool_idle_timeout))
        .build()
        .map_err(|source| TransportError::Client { source })
}

/// Streaming client: bounded connect, keep-alive per policy, no overall
/// timeout so established streams are never cut off.
pub(crate) fn build_stream_client(policy: &ConnectPolicy) -> Result<Client, TransportError> {
    base_client_builder()
        .connect_timeout(policy.connect_timeout)
        .tcp_keepalive(Some(policy.keep_alive))
        .pool_idle_timeout(Some(policy.keep_alive))
        .build()
        .map_err(|source| TransportError::Client { source })
}
