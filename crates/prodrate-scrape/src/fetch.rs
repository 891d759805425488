//! Metrics page retrieval.
//!
//! `HttpFetcher` issues a plain HTTP/1.1 GET over a fresh TCP connection
//! per scrape. The whole exchange (connect, request, body) shares one
//! timeout budget; any non-2xx status is a failure.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http_body_util::{BodyExt, Empty};
use tokio::net::TcpStream;
use tracing::debug;

use prodrate_core::ProdrateConfig;

use crate::error::FetchError;

/// Boxed future returned by [`MetricsSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;

/// Source of exposition payloads.
pub trait MetricsSource: Send + Sync {
    /// Fetch one payload.
    fn fetch(&self) -> FetchFuture<'_>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Fetches `http://{address}{path}` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    address: String,
    path: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(address: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProdrateConfig) -> Self {
        Self::new(
            config.producer_connection.clone(),
            config.metrics_path.clone(),
            config.fetch_timeout(),
        )
    }

    pub fn uri(&self) -> String {
        format!("http://{}{}", self.address, self.path)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET the metrics page and return its body as text.
    pub async fn get(&self) -> Result<String, FetchError> {
        match tokio::time::timeout(self.timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => {
                debug!(uri = %self.uri(), timeout = ?self.timeout, "metrics fetch timed out");
                Err(FetchError::Timeout(self.timeout))
            }
        }
    }

    async fn exchange(&self) -> Result<String, FetchError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| FetchError::Connect {
                address: self.address.clone(),
                source,
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|source| FetchError::Handshake {
                address: self.address.clone(),
                source,
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "metrics connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(self.path.as_str())
            .header(HOST, self.address.as_str())
            .header(USER_AGENT, concat!("prodrate/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "text/plain")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await.map_err(FetchError::Request)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: self.uri(),
                status,
            });
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(FetchError::Body)?
            .to_bytes();
        debug!(bytes = body.len(), %status, "metrics page fetched");

        Ok(String::from_utf8(body.to_vec())?)
    }
}

impl MetricsSource for HttpFetcher {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.get())
    }

    fn describe(&self) -> String {
        self.uri()
    }
}
