//! Feature attributes, partial updates and request payloads.
//!
//! Features carry a handful of typed columns alongside a free-form property
//! map. Payload types deserialise straight from the JSON bodies accepted by
//! the HTTP layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Free-form attribute map attached to every feature. Key order is kept.
pub type Properties = serde_json::Map<String, Value>;

/// Travel direction permitted on a road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Traffic flows along the drawing direction only.
    Oneway,
    /// Traffic flows against the drawing direction only.
    OnewayReverse,
    /// Traffic flows both ways.
    Bidirectional,
}

impl Direction {
    /// Stored and serialised name of the direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oneway => "oneway",
            Self::OnewayReverse => "oneway_reverse",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Direction`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown road direction {value:?}")]
pub struct ParseDirectionError {
    /// Rejected input.
    pub value: String,
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "oneway" => Ok(Self::Oneway),
            "oneway_reverse" => Ok(Self::OnewayReverse),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(ParseDirectionError {
                value: other.to_owned(),
            }),
        }
    }
}

/// Typed building and road columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureAttributes {
    /// House number of a building.
    #[serde(default)]
    pub building_number: Option<String>,
    /// Building classification, e.g. `residential`.
    #[serde(default)]
    pub building_type: Option<String>,
    /// Display glyph used by map clients.
    #[serde(default)]
    pub icon: Option<String>,
    /// OpenStreetMap element id for imported features.
    #[serde(default)]
    pub osm_id: Option<String>,
    /// Highway classification, e.g. `residential`.
    #[serde(default)]
    pub road_type: Option<String>,
    /// Permitted travel direction.
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Number of lanes.
    #[serde(default)]
    pub lane_count: Option<u32>,
    /// Speed limit in the unit posted on the road.
    #[serde(default)]
    pub max_speed: Option<u32>,
    /// Road surface, e.g. `asphalt`.
    #[serde(default)]
    pub surface: Option<String>,
}

impl FeatureAttributes {
    /// Typed columns as `(name, value)` pairs, skipping unset ones.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, Value)> {
        let text = |name, value: &Option<String>| {
            value.as_ref().map(|v| (name, Value::String(v.clone())))
        };
        [
            text("building_number", &self.building_number),
            text("building_type", &self.building_type),
            text("icon", &self.icon),
            text("osm_id", &self.osm_id),
            text("road_type", &self.road_type),
            self.direction
                .map(|d| ("direction", Value::String(d.as_str().to_owned()))),
            self.lane_count.map(|n| ("lane_count", Value::from(n))),
            self.max_speed.map(|n| ("max_speed", Value::from(n))),
            text("surface", &self.surface),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// A three-state field change.
///
/// In JSON an absent member deserialises to [`Patch::Keep`] (with
/// `#[serde(default)]`), `null` to [`Patch::Clear`], and any other value to
/// [`Patch::Set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the current value untouched.
    Keep,
    /// Remove the current value.
    Clear,
    /// Replace the current value.
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> Patch<T> {
    /// Whether the patch leaves the field untouched.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Apply the patch to an optional slot.
    pub fn apply(self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *slot = None,
            Self::Set(value) => *slot = Some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Self::Clear, Self::Set))
    }
}

/// Changes to the typed columns of a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AttributeChanges {
    /// New house number.
    #[serde(default)]
    pub building_number: Patch<String>,
    /// New building classification.
    #[serde(default)]
    pub building_type: Patch<String>,
    /// New display glyph.
    #[serde(default)]
    pub icon: Patch<String>,
    /// New OpenStreetMap element id.
    #[serde(default)]
    pub osm_id: Patch<String>,
    /// New highway classification.
    #[serde(default)]
    pub road_type: Patch<String>,
    /// New travel direction.
    #[serde(default)]
    pub direction: Patch<Direction>,
    /// New lane count.
    #[serde(default)]
    pub lane_count: Patch<u32>,
    /// New speed limit.
    #[serde(default)]
    pub max_speed: Patch<u32>,
    /// New road surface.
    #[serde(default)]
    pub surface: Patch<String>,
}

impl AttributeChanges {
    /// Whether no typed column is touched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.building_number.is_keep()
            && self.building_type.is_keep()
            && self.icon.is_keep()
            && self.osm_id.is_keep()
            && self.road_type.is_keep()
            && self.direction.is_keep()
            && self.lane_count.is_keep()
            && self.max_speed.is_keep()
            && self.surface.is_keep()
    }

    /// Apply every change to `attributes`.
    pub fn apply_to(self, attributes: &mut FeatureAttributes) {
        self.building_number.apply(&mut attributes.building_number);
        self.building_type.apply(&mut attributes.building_type);
        self.icon.apply(&mut attributes.icon);
        self.osm_id.apply(&mut attributes.osm_id);
        self.road_type.apply(&mut attributes.road_type);
        self.direction.apply(&mut attributes.direction);
        self.lane_count.apply(&mut attributes.lane_count);
        self.max_speed.apply(&mut attributes.max_speed);
        self.surface.apply(&mut attributes.surface);
    }
}

/// Payload for creating a feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFeature {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free text description.
    #[serde(default)]
    pub description: Option<String>,
    /// GeoJSON geometry object; validated by the geometry codec.
    pub geometry: Value,
    /// Free-form attributes. `null` is treated as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
    /// Typed columns.
    #[serde(flatten)]
    pub attributes: FeatureAttributes,
}

/// Payload for a partial update. Absent members are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureUpdate {
    /// New display name.
    #[serde(default)]
    pub name: Patch<String>,
    /// New description.
    #[serde(default)]
    pub description: Patch<String>,
    /// Replacement geometry. Clearing it is rejected.
    #[serde(default)]
    pub geometry: Patch<Value>,
    /// Replacement attribute map. Clearing resets it to `{}`.
    #[serde(default)]
    pub properties: Patch<Properties>,
    /// Typed column changes.
    #[serde(flatten)]
    pub attributes: AttributeChanges,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Properties, D::Error> {
    Option::<Properties>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Northern latitude.
    pub north: f64,
    /// Southern latitude.
    pub south: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Western longitude.
    pub west: f64,
}

/// Reasons a [`BoundingBox`] is rejected.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum BoundingBoxError {
    /// A bound is NaN or infinite.
    #[error("bounding box coordinates must be finite")]
    NonFinite,
    /// A latitude lies outside [-90, 90].
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Offending latitude.
        value: f64,
    },
    /// A longitude lies outside [-180, 180].
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// Offending longitude.
        value: f64,
    },
    /// South lies above north.
    #[error("south {south} must not exceed north {north}")]
    InvertedLatitudes {
        /// Southern bound.
        south: f64,
        /// Northern bound.
        north: f64,
    },
    /// West lies east of east.
    #[error("west {west} must not exceed east {east}")]
    InvertedLongitudes {
        /// Western bound.
        west: f64,
        /// Eastern bound.
        east: f64,
    },
}

impl BoundingBox {
    /// Check the box lies within WGS84 bounds and is not inverted.
    ///
    /// # Examples
    /// ```
    /// use mapedit_core::{BoundingBox, BoundingBoxError};
    ///
    /// let bbox = BoundingBox { north: 52.52, south: 52.51, east: 13.41, west: 13.40 };
    /// assert!(bbox.validate().is_ok());
    ///
    /// let inverted = BoundingBox { north: 52.50, ..bbox };
    /// assert!(matches!(
    ///     inverted.validate(),
    ///     Err(BoundingBoxError::InvertedLatitudes { .. })
    /// ));
    /// ```
    pub fn validate(&self) -> Result<(), BoundingBoxError> {
        let bounds = [self.north, self.south, self.east, self.west];
        if !bounds.iter().all(|v| v.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        for value in [self.north, self.south] {
            if !(-90.0..=90.0).contains(&value) {
                return Err(BoundingBoxError::LatitudeOutOfRange { value });
            }
        }
        for value in [self.east, self.west] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(BoundingBoxError::LongitudeOutOfRange { value });
            }
        }
        if self.south > self.north {
            return Err(BoundingBoxError::InvertedLatitudes {
                south: self.south,
                north: self.north,
            });
        }
        if self.west > self.east {
            return Err(BoundingBoxError::InvertedLongitudes {
                west: self.west,
                east: self.east,
            });
        }
        Ok(())
    }
}
