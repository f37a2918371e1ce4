//! OpenStreetMap import for the map editor.
//!
//! Responsibilities:
//! - Query Overpass endpoints with ordered fallback.
//! - Classify returned elements and map their tags onto feature columns.
//! - Persist new features, skipping OSM ids that are already stored.
//!
//! Boundaries:
//! - Feature model, geometry codec and storage live in `mapedit-core`.
//! - Blocking store calls are left to the caller to schedule; fetching is
//!   async and never touches the store.
#![forbid(unsafe_code)]

pub mod import;
pub mod overpass;

pub use import::{ImportBatch, ImportError, ImportReport, OsmCategory, OsmImporter};
pub use overpass::{
    HttpOverpassSource, OverpassBuildError, OverpassConfig, OverpassError, OverpassResponse,
    OverpassSource, TransportError,
};
