//! Scrape error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching the metrics page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: hyper::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("{uri} returned {status}")]
    Status {
        uri: String,
        status: http::StatusCode,
    },

    #[error("reading response body failed: {0}")]
    Body(#[source] hyper::Error),

    #[error("response body is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a scrape cycle produced no sample.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse error: {0}")]
    Parse(#[from] prodrate_core::ParseError),
}
