//! Error types for the server binary and its HTTP handlers.
//!
//! [`ServerError`] covers start-up and shutdown. [`ApiError`] is what
//! handlers return; it renders as `{"detail": "..."}` with a status chosen
//! from the failing operation.

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use camino::Utf8PathBuf;
use log::error;
use mapedit_core::{FeatureServiceError, FeatureStoreError};
use mapedit_data::{ImportError, OverpassBuildError};
use serde_json::json;
use thiserror::Error;

use crate::style::StyleError;

/// Errors emitted while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option resolved to nothing after merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The bind address is not a socket address.
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBind {
        value: String,
        #[source]
        source: AddrParseError,
    },
    /// An Overpass endpoint is not a URL.
    #[error("invalid Overpass endpoint {value:?}: {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },
    /// A timeout option was zero.
    #[error("{field} must be greater than zero")]
    InvalidTimeout { field: &'static str },
    /// The feature database could not be opened.
    #[error("failed to open feature database at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: FeatureStoreError,
    },
    /// The Overpass HTTP client could not be built.
    #[error(transparent)]
    BuildOverpassClient(#[from] OverpassBuildError),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The server stopped with an IO failure.
    #[error("server failed: {0}")]
    Serve(#[source] io::Error),
}

/// Failure returned by an HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed resource does not exist.
    #[error("{detail}")]
    NotFound {
        /// Message for the client.
        detail: String,
    },
    /// The request could not be served as sent.
    #[error("{detail}")]
    BadRequest {
        /// Message for the client.
        detail: String,
    },
    /// The server failed while handling a valid request.
    #[error("{detail}")]
    Internal {
        /// Message for the client.
        detail: String,
    },
}

impl ApiError {
    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest {
            detail: detail.into(),
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Map a failure from a read-only feature operation.
    pub(crate) fn from_read(err: &FeatureServiceError) -> Self {
        match err {
            FeatureServiceError::NotFound { .. } => Self::NotFound {
                detail: err.to_string(),
            },
            other => Self::internal(error_chain(other)),
        }
    }

    /// Map a failure from a mutating feature operation.
    ///
    /// `action` prefixes the detail, e.g. `creating` yields
    /// `Error creating feature: ...`.
    pub(crate) fn from_write(action: &str, err: &FeatureServiceError) -> Self {
        match err {
            FeatureServiceError::NotFound { .. } => Self::NotFound {
                detail: err.to_string(),
            },
            other => Self::bad_request(format!("Error {action} feature: {}", error_chain(other))),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        Self::bad_request(format!("Error loading OSM data: {}", error_chain(&err)))
    }
}

impl From<StyleError> for ApiError {
    fn from(err: StyleError) -> Self {
        match err {
            StyleError::NotFound { .. } => Self::NotFound {
                detail: err.to_string(),
            },
            StyleError::Read { .. } | StyleError::InvalidFormat { .. } => {
                Self::internal(error_chain(&err))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("background task failed: {err}"))
    }
}

/// Render `err` followed by its sources, separated by `: `.
///
/// Messages already quoting their source are not repeated.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
