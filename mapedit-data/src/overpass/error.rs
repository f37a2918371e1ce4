use std::io;

use thiserror::Error;

/// Failure of a single request to one endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a status other than 200.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Endpoint URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request did not complete.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Endpoint URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
}

/// Errors returned by an [`OverpassSource`](super::OverpassSource).
#[derive(Debug, Error)]
pub enum OverpassError {
    /// No endpoint was configured.
    #[error("no Overpass endpoints are configured")]
    NoEndpoints,
    /// Every endpoint failed.
    #[error("all {attempts} Overpass endpoints failed; last error: {last}")]
    UpstreamUnavailable {
        /// Number of endpoints tried.
        attempts: usize,
        /// Failure of the final attempt.
        #[source]
        last: TransportError,
    },
    /// An endpoint answered 200 but the body was not Overpass JSON.
    #[error("failed to decode Overpass response from {url}: {message}")]
    Decode {
        /// Endpoint URL.
        url: String,
        /// Decoder message.
        message: String,
    },
}

/// Error raised when building an [`HttpOverpassSource`](super::HttpOverpassSource).
#[derive(Debug, Error)]
pub enum OverpassBuildError {
    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}
