//! Core domain types for the map editor.
//!
//! The crate owns the feature model, the GeoJSON geometry codec, the SQLite
//! feature store and the service that combines them. HTTP and OSM import
//! concerns live in sibling crates.
#![forbid(unsafe_code)]

pub mod geometry;
pub mod model;
pub mod service;
pub mod store;

pub use geometry::{GeometryError, GeometryKind, SRID_WGS84, StoredGeometry};
pub use model::{
    AttributeChanges, BoundingBox, BoundingBoxError, Direction, FeatureAttributes, FeatureUpdate,
    NewFeature, ParseDirectionError, Patch, Properties,
};
pub use service::{FeatureResponse, FeatureService, FeatureServiceError};
pub use store::{
    FeatureChanges, FeatureDraft, FeatureRecord, FeatureStore, FeatureStoreError,
    OsmInsertOutcome, SqliteFeatureStore,
};
