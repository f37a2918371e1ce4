//! Overpass API access.
//!
//! [`OverpassSource`] is the seam between the importer and the network.
//! [`HttpOverpassSource`] POSTs queries to an ordered list of endpoints and
//! returns the first successful answer.

mod client;
mod error;
mod response;

#[doc(hidden)]
pub mod test_support;

use async_trait::async_trait;

pub use client::{DEFAULT_ENDPOINTS, DEFAULT_USER_AGENT, HttpOverpassSource, OverpassConfig};
pub use error::{OverpassBuildError, OverpassError, TransportError};
pub use response::{ElementKind, LatLon, OverpassElement, OverpassResponse, RelationMember};

/// Executes Overpass QL queries.
#[async_trait]
pub trait OverpassSource: Send + Sync {
    /// Run `query` and decode the JSON answer.
    async fn query(&self, query: &str) -> Result<OverpassResponse, OverpassError>;
}
