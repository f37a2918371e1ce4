//! Feature operations exposed to the HTTP layer.
//!
//! [`FeatureService`] composes a [`FeatureStore`] with the geometry codec and
//! shapes results as GeoJSON.

use chrono::{DateTime, Utc};
use geojson::feature::Id;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::geometry::{self, GeometryError};
use crate::model::{FeatureAttributes, FeatureUpdate, NewFeature, Patch, Properties};
use crate::store::{FeatureChanges, FeatureDraft, FeatureRecord, FeatureStore, FeatureStoreError};

/// Errors surfaced by [`FeatureService`].
#[derive(Debug, Error)]
pub enum FeatureServiceError {
    /// No feature has the requested id.
    #[error("Feature not found")]
    NotFound {
        /// Requested identifier.
        id: i64,
    },
    /// The payload failed validation.
    #[error("{reason}")]
    InvalidInput {
        /// Description of the defect.
        reason: String,
    },
    /// A stored geometry could not be decoded.
    #[error("feature {id} has an unreadable geometry")]
    CorruptGeometry {
        /// Identifier of the affected feature.
        id: i64,
        /// Codec failure.
        #[source]
        source: GeometryError,
    },
    /// The store failed.
    #[error(transparent)]
    Store(#[from] FeatureStoreError),
}

impl FeatureServiceError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// A feature as returned by create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureResponse {
    /// Store-assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Free text description.
    pub description: Option<String>,
    /// Decoded GeoJSON geometry.
    pub geometry: geojson::Geometry,
    /// Stored attribute map, without typed columns merged in.
    pub properties: Properties,
    /// Typed columns.
    #[serde(flatten)]
    pub attributes: FeatureAttributes,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// Feature operations over a store.
#[derive(Debug, Clone)]
pub struct FeatureService<S> {
    store: S,
}

impl<S: FeatureStore> FeatureService<S> {
    /// Wrap `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Every feature as a GeoJSON collection.
    ///
    /// Each feature's properties hold the stored attribute map with `name`,
    /// `description` and the typed columns merged in. Typed columns win key
    /// clashes and `null` entries are dropped.
    pub fn list_features(&self) -> Result<geojson::FeatureCollection, FeatureServiceError> {
        let features = self
            .store
            .list()?
            .into_iter()
            .map(to_geojson_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    /// A single feature in the same shape as [`Self::list_features`].
    pub fn get_feature(&self, id: i64) -> Result<geojson::Feature, FeatureServiceError> {
        let record = self
            .store
            .get(id)?
            .ok_or(FeatureServiceError::NotFound { id })?;
        to_geojson_feature(record)
    }

    /// Validate and insert a new feature.
    pub fn create_feature(
        &self,
        input: NewFeature,
    ) -> Result<FeatureResponse, FeatureServiceError> {
        let geometry = geometry::encode(&input.geometry).map_err(invalid_geometry)?;
        let record = self.store.insert(FeatureDraft {
            name: input.name,
            description: input.description,
            geometry,
            properties: input.properties,
            attributes: input.attributes,
        })?;
        log::debug!("created feature {}", record.id);
        to_response(record)
    }

    /// Apply the fields present in `update` to feature `id`.
    pub fn update_feature(
        &self,
        id: i64,
        update: FeatureUpdate,
    ) -> Result<FeatureResponse, FeatureServiceError> {
        let geometry = match update.geometry {
            Patch::Keep => None,
            Patch::Clear => return Err(FeatureServiceError::invalid("geometry cannot be cleared")),
            Patch::Set(value) => Some(geometry::encode(&value).map_err(invalid_geometry)?),
        };
        let properties = match update.properties {
            Patch::Keep => None,
            Patch::Clear => Some(Properties::new()),
            Patch::Set(properties) => Some(properties),
        };
        let changes = FeatureChanges {
            name: update.name,
            description: update.description,
            geometry,
            properties,
            attributes: update.attributes,
        };

        let record = self
            .store
            .update(id, changes)?
            .ok_or(FeatureServiceError::NotFound { id })?;
        to_response(record)
    }

    /// Remove feature `id`.
    pub fn delete_feature(&self, id: i64) -> Result<(), FeatureServiceError> {
        if self.store.delete(id)? {
            Ok(())
        } else {
            Err(FeatureServiceError::NotFound { id })
        }
    }

    /// Remove every feature, returning how many were removed.
    pub fn clear_all_features(&self) -> Result<u64, FeatureServiceError> {
        let count = self.store.clear()?;
        log::info!("cleared {count} features");
        Ok(count)
    }
}

fn invalid_geometry(err: GeometryError) -> FeatureServiceError {
    FeatureServiceError::invalid(err.to_string())
}

fn decode(record: &FeatureRecord) -> Result<geojson::Geometry, FeatureServiceError> {
    geometry::decode(&record.geometry).map_err(|source| FeatureServiceError::CorruptGeometry {
        id: record.id,
        source,
    })
}

fn to_response(record: FeatureRecord) -> Result<FeatureResponse, FeatureServiceError> {
    let geometry = decode(&record)?;
    Ok(FeatureResponse {
        id: record.id,
        name: record.name,
        description: record.description,
        geometry,
        properties: record.properties,
        attributes: record.attributes,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn to_geojson_feature(record: FeatureRecord) -> Result<geojson::Feature, FeatureServiceError> {
    let geometry = decode(&record)?;
    Ok(geojson::Feature {
        bbox: None,
        geometry: Some(geometry),
        id: Some(Id::Number(record.id.into())),
        properties: Some(merged_properties(record)),
        foreign_members: None,
    })
}

const TYPED_KEYS: [&str; 11] = [
    "name",
    "description",
    "building_number",
    "building_type",
    "icon",
    "osm_id",
    "road_type",
    "direction",
    "lane_count",
    "max_speed",
    "surface",
];

fn merged_properties(record: FeatureRecord) -> Properties {
    let mut merged: Properties = record
        .properties
        .into_iter()
        .filter(|(key, value)| !value.is_null() && !TYPED_KEYS.contains(&key.as_str()))
        .collect();
    let text = |name: &str, value: Option<String>| value.map(|v| (name.to_owned(), Value::String(v)));
    merged.extend(text("name", record.name));
    merged.extend(text("description", record.description));
    merged.extend(
        record
            .attributes
            .to_pairs()
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value)),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::encode;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn record(properties: Value) -> FeatureRecord {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("timestamp");
        FeatureRecord {
            id: 7,
            name: Some("Main Street".to_owned()),
            description: None,
            geometry: encode(&json!({"type": "Point", "coordinates": [1.0, 2.0]}))
                .expect("encode point"),
            properties: serde_json::from_value(properties).expect("properties object"),
            attributes: FeatureAttributes {
                road_type: Some("primary".to_owned()),
                ..FeatureAttributes::default()
            },
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    #[rstest]
    fn typed_columns_win_over_stored_keys() {
        let merged = merged_properties(record(json!({
            "name": "Stale name",
            "road_type": "track",
            "colour": "red"
        })));
        assert_eq!(merged.get("name"), Some(&json!("Main Street")));
        assert_eq!(merged.get("road_type"), Some(&json!("primary")));
        assert_eq!(merged.get("colour"), Some(&json!("red")));
    }

    #[rstest]
    fn null_and_unset_entries_are_dropped() {
        let merged = merged_properties(record(json!({
            "description": "stored only",
            "note": null
        })));
        assert!(!merged.contains_key("description"));
        assert!(!merged.contains_key("note"));
        assert!(!merged.contains_key("surface"));
    }

    #[rstest]
    fn geojson_feature_carries_numeric_id() {
        let feature = to_geojson_feature(record(json!({}))).expect("convert record");
        assert_eq!(feature.id, Some(Id::Number(7.into())));
        assert_eq!(
            feature.geometry.map(|g| g.value),
            Some(geojson::Value::Point(vec![1.0, 2.0]))
        );
    }

    #[rstest]
    fn response_serialises_typed_columns_at_top_level() {
        let response = to_response(record(json!({}))).expect("convert record");
        let value = serde_json::to_value(&response).expect("serialise response");
        assert_eq!(value["road_type"], json!("primary"));
        assert_eq!(value["surface"], Value::Null);
        assert_eq!(value["geometry"]["type"], json!("Point"));
    }
}
