//! Overpass JSON response types.
//!
//! Only the members produced by `out body` (nodes) and `out geom` (ways and
//! relations) are modelled. Unknown members are ignored.
//!
//! See: <https://wiki.openstreetmap.org/wiki/Overpass_API/Output_Formats>

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level Overpass answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverpassResponse {
    /// Returned elements in server order.
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// OSM element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A single tagged position.
    Node,
    /// An ordered list of nodes.
    Way,
    /// A group of members with roles.
    Relation,
    /// Any other element type, such as `area`.
    #[serde(other)]
    Other,
}

impl ElementKind {
    /// OSM name of the element type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
            Self::Other => "other",
        }
    }
}

/// A position in Overpass output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// One element of an Overpass answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverpassElement {
    /// Element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// OSM id, unique within its element type.
    pub id: i64,
    /// Node latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Node longitude.
    #[serde(default)]
    pub lon: Option<f64>,
    /// OSM tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Way geometry. Missing nodes are reported as `null`.
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
    /// Relation members.
    #[serde(default)]
    pub members: Vec<RelationMember>,
}

impl OverpassElement {
    /// Value of tag `key`.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether tag `key` equals `value`.
    #[must_use]
    pub fn tag_is(&self, key: &str, value: &str) -> bool {
        self.tag(key) == Some(value)
    }
}

/// Member of a relation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationMember {
    /// Member element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Member OSM id.
    #[serde(rename = "ref")]
    pub reference: i64,
    /// Role within the relation, e.g. `outer`.
    #[serde(default)]
    pub role: String,
    /// Member geometry for way members.
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
}
