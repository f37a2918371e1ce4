//! Facade crate for the map editor.
//!
//! This crate re-exports the feature model, store and service from
//! `mapedit-core` and the OSM importer from `mapedit-data`.

#![forbid(unsafe_code)]

pub use mapedit_core::{
    BoundingBox, Direction, FeatureAttributes, FeatureResponse, FeatureService,
    FeatureServiceError, FeatureStore, FeatureStoreError, FeatureUpdate, GeometryError,
    NewFeature, Patch, Properties, SqliteFeatureStore,
};

pub use mapedit_data::{
    HttpOverpassSource, ImportError, ImportReport, OsmCategory, OsmImporter, OverpassConfig,
    OverpassSource,
};
