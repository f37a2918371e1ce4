//! Test utilities for Overpass consumers.
//!
//! [`StubOverpassSource`] answers every query from memory and records the
//! query text so tests can assert on it.

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{OverpassError, OverpassResponse, OverpassSource, TransportError};

/// Stub [`OverpassSource`] returning a canned answer.
///
/// # Example
///
/// ```
/// use mapedit_data::overpass::test_support::StubOverpassSource;
///
/// let source = StubOverpassSource::with_json(r#"{"elements": []}"#);
/// assert!(source.queries().is_empty());
/// ```
#[derive(Debug)]
pub struct StubOverpassSource {
    answer: StubAnswer,
    queries: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
enum StubAnswer {
    Response(OverpassResponse),
    Unavailable { attempts: usize, message: String },
}

impl StubOverpassSource {
    /// Stub answering every query with `response`.
    #[must_use]
    pub fn with_response(response: OverpassResponse) -> Self {
        Self::new(StubAnswer::Response(response))
    }

    /// Stub answering with the JSON document `json`.
    ///
    /// # Panics
    ///
    /// Panics when `json` is not an Overpass document.
    #[must_use]
    pub fn with_json(json: &str) -> Self {
        let response = serde_json::from_str(json).expect("stub JSON should be an Overpass response");
        Self::with_response(response)
    }

    /// Stub failing every query as if all `attempts` endpoints were down.
    #[must_use]
    pub fn unavailable(attempts: usize, message: impl Into<String>) -> Self {
        Self::new(StubAnswer::Unavailable {
            attempts,
            message: message.into(),
        })
    }

    fn new(answer: StubAnswer) -> Self {
        Self {
            answer,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OverpassSource for StubOverpassSource {
    async fn query(&self, query: &str) -> Result<OverpassResponse, OverpassError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_owned());
        }
        match &self.answer {
            StubAnswer::Response(response) => Ok(response.clone()),
            StubAnswer::Unavailable { attempts, message } => {
                Err(OverpassError::UpstreamUnavailable {
                    attempts: *attempts,
                    last: TransportError::Network {
                        url: "https://overpass.invalid/api/interpreter".to_owned(),
                        source: io::Error::other(message.clone()),
                    },
                })
            }
        }
    }
}
