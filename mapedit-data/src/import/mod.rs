//! Import of OpenStreetMap features via Overpass.
//!
//! An import runs in two phases. [`OsmImporter::collect`] fetches and maps
//! elements without touching storage. [`ImportBatch::persist`] then writes
//! the drafts in one transaction, skipping OSM ids that are already stored.
//! The write transaction takes the database lock up front, so two imports
//! of the same area running concurrently store each OSM id once.

mod mapping;
mod query;
mod tags;

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use mapedit_core::{BoundingBox, BoundingBoxError, FeatureDraft, FeatureStore, FeatureStoreError};
use serde::Serialize;
use thiserror::Error;

use crate::overpass::{OverpassError, OverpassSource};

/// Kinds of OSM features the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OsmCategory {
    /// Building outlines from ways and multipolygon relations.
    Buildings,
    /// Highway ways.
    Roads,
    /// Street lamp nodes.
    Streetlights,
    /// Traffic signal nodes.
    TrafficLights,
}

impl OsmCategory {
    /// Plural snake-case name, e.g. `traffic_lights`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buildings => "buildings",
            Self::Roads => "roads",
            Self::Streetlights => "streetlights",
            Self::TrafficLights => "traffic_lights",
        }
    }

    /// Singular `feature_type` property recorded on imported rows.
    #[must_use]
    pub const fn feature_type(self) -> &'static str {
        match self {
            Self::Buildings => "building",
            Self::Roads => "road",
            Self::Streetlights => "streetlight",
            Self::TrafficLights => "traffic_light",
        }
    }
}

impl fmt::Display for OsmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by an import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The requested area is not a valid WGS84 box.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(#[from] BoundingBoxError),
    /// Fetching from Overpass failed.
    #[error(transparent)]
    Upstream(#[from] OverpassError),
    /// Writing the batch failed; nothing was stored.
    #[error("failed to store imported features")]
    Store(#[from] FeatureStoreError),
}

/// Outcome of a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Imported category.
    pub category: OsmCategory,
    /// Elements returned by Overpass.
    pub fetched: usize,
    /// Rows written.
    pub inserted: usize,
    /// Elements whose OSM id was already stored.
    pub skipped_existing: usize,
    /// Elements that could not be mapped onto a feature.
    pub skipped_invalid: usize,
}

/// Mapped drafts awaiting persistence.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    category: OsmCategory,
    fetched: usize,
    drafts: Vec<FeatureDraft>,
    skipped_invalid: usize,
}

impl ImportBatch {
    /// Store the drafts whose OSM id is new, in a single transaction.
    ///
    /// This call blocks on the store.
    pub fn persist<S>(self, store: &S) -> Result<ImportReport, ImportError>
    where
        S: FeatureStore + ?Sized,
    {
        let outcome = store.insert_new_by_osm_id(&self.drafts)?;
        let report = ImportReport {
            category: self.category,
            fetched: self.fetched,
            inserted: outcome.inserted,
            skipped_existing: outcome.skipped_existing,
            skipped_invalid: self.skipped_invalid,
        };
        info!(
            "imported {}: {} fetched, {} inserted, {} already stored, {} invalid",
            report.category,
            report.fetched,
            report.inserted,
            report.skipped_existing,
            report.skipped_invalid
        );
        Ok(report)
    }
}

/// Fetches OSM elements and maps them onto feature drafts.
#[derive(Clone)]
pub struct OsmImporter {
    source: Arc<dyn OverpassSource>,
}

impl fmt::Debug for OsmImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsmImporter").finish_non_exhaustive()
    }
}

impl OsmImporter {
    /// Importer querying `source`.
    #[must_use]
    pub fn new(source: Arc<dyn OverpassSource>) -> Self {
        Self { source }
    }

    /// Fetch `category` inside `bbox` and map every element.
    ///
    /// Elements that cannot be mapped are logged and counted rather than
    /// failing the batch.
    pub async fn collect(
        &self,
        category: OsmCategory,
        bbox: &BoundingBox,
    ) -> Result<ImportBatch, ImportError> {
        bbox.validate()?;
        let query = query::build_query(category, bbox);
        let response = self.source.query(&query).await?;

        let fetched = response.elements.len();
        let mut drafts = Vec::with_capacity(fetched);
        let mut skipped_invalid = 0;
        for element in &response.elements {
            match mapping::map_element(category, element) {
                Ok(draft) => drafts.push(draft),
                Err(reason) => {
                    warn!(
                        "skipping {} {} during {category} import: {reason}",
                        element.kind.as_str(),
                        element.id
                    );
                    skipped_invalid += 1;
                }
            }
        }

        Ok(ImportBatch {
            category,
            fetched,
            drafts,
            skipped_invalid,
        })
    }
}
