//! Persistence of features.
//!
//! The [`FeatureStore`] trait describes the operations the service layer
//! needs. [`SqliteFeatureStore`] implements it over a single SQLite table.
#![forbid(unsafe_code)]

mod schema;
mod sqlite;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::geometry::StoredGeometry;
use crate::model::{AttributeChanges, FeatureAttributes, Patch, Properties};

pub use schema::{SCHEMA_VERSION, SchemaError};
pub use sqlite::SqliteFeatureStore;

/// A persisted feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Free text description.
    pub description: Option<String>,
    /// Encoded geometry.
    pub geometry: StoredGeometry,
    /// Free-form attributes.
    pub properties: Properties,
    /// Typed columns.
    pub attributes: FeatureAttributes,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// A feature ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDraft {
    /// Display name.
    pub name: Option<String>,
    /// Free text description.
    pub description: Option<String>,
    /// Encoded geometry.
    pub geometry: StoredGeometry,
    /// Free-form attributes.
    pub properties: Properties,
    /// Typed columns.
    pub attributes: FeatureAttributes,
}

/// Validated changes to an existing row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureChanges {
    /// Name change.
    pub name: Patch<String>,
    /// Description change.
    pub description: Patch<String>,
    /// Replacement geometry.
    pub geometry: Option<StoredGeometry>,
    /// Replacement attribute map.
    pub properties: Option<Properties>,
    /// Typed column changes.
    pub attributes: AttributeChanges,
}

impl FeatureChanges {
    /// Whether applying the changes would leave a row untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_keep()
            && self.description.is_keep()
            && self.geometry.is_none()
            && self.properties.is_none()
            && self.attributes.is_empty()
    }

    /// Apply the changes to `record`. Timestamps are left to the store.
    pub fn apply_to(self, record: &mut FeatureRecord) {
        self.name.apply(&mut record.name);
        self.description.apply(&mut record.description);
        if let Some(geometry) = self.geometry {
            record.geometry = geometry;
        }
        if let Some(properties) = self.properties {
            record.properties = properties;
        }
        self.attributes.apply_to(&mut record.attributes);
    }
}

/// Counts produced by [`FeatureStore::insert_new_by_osm_id`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OsmInsertOutcome {
    /// Rows written.
    pub inserted: usize,
    /// Drafts skipped because their `osm_id` was already stored.
    pub skipped_existing: usize,
}

/// Errors raised by feature persistence.
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    /// Failed to create the parent directory of the database file.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Database path whose parent could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Schema initialisation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A statement failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Operation being attempted.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Serialising the property map failed.
    #[error("failed to serialise properties")]
    SerializeProperties {
        /// JSON encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored row could not be interpreted.
    #[error("feature {id} holds invalid data: {reason}")]
    InvalidRow {
        /// Identifier of the offending row.
        id: i64,
        /// Description of the defect.
        reason: String,
    },
}

/// Storage operations over features.
///
/// Each call is atomic: it either completes fully or leaves the store as it
/// was.
pub trait FeatureStore: Send + Sync {
    /// Every row ordered by id.
    fn list(&self) -> Result<Vec<FeatureRecord>, FeatureStoreError>;

    /// The row with `id`, if any.
    fn get(&self, id: i64) -> Result<Option<FeatureRecord>, FeatureStoreError>;

    /// Insert a row, stamping both timestamps with the current time.
    fn insert(&self, draft: FeatureDraft) -> Result<FeatureRecord, FeatureStoreError>;

    /// Apply `changes` to the row with `id` and refresh `updated_at`.
    ///
    /// Returns `None` when no row matches. Empty changes return the current
    /// row untouched.
    fn update(
        &self,
        id: i64,
        changes: FeatureChanges,
    ) -> Result<Option<FeatureRecord>, FeatureStoreError>;

    /// Remove the row with `id`, reporting whether one existed.
    fn delete(&self, id: i64) -> Result<bool, FeatureStoreError>;

    /// Remove every row, returning how many existed.
    fn clear(&self) -> Result<u64, FeatureStoreError>;

    /// Insert drafts whose `osm_id` is not yet stored, in one transaction.
    ///
    /// Drafts without an `osm_id` are always inserted. Duplicate ids within
    /// the batch are inserted once. Concurrent calls against the same
    /// database serialise, so two imports of one area store each id once.
    fn insert_new_by_osm_id(
        &self,
        drafts: &[FeatureDraft],
    ) -> Result<OsmInsertOutcome, FeatureStoreError>;
}
