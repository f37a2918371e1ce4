//! Conversion between GeoJSON geometry objects and the stored encoding.
//!
//! Features persist their geometry as a WKB payload tagged with an SRID and
//! the geometry kind. Only `Point`, `LineString` and `Polygon` are accepted,
//! and every encoded value carries SRID 4326 (WGS84, `x = longitude`,
//! `y = latitude`).

use std::fmt;
use std::str::FromStr;

use geo::{Coord, Geometry, LineString, Point, Polygon};
use serde_json::Value;
use thiserror::Error;

/// Spatial reference identifier of WGS84 geographic coordinates.
pub const SRID_WGS84: i32 = 4326;

/// The geometry types a feature may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// An open or closed path of two or more positions.
    LineString,
    /// A closed exterior ring with optional holes.
    Polygon,
}

impl GeometryKind {
    /// GeoJSON `type` member for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
        }
    }

    fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::LineString(_) => Some(Self::LineString),
            Geometry::Polygon(_) => Some(Self::Polygon),
            _ => None,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = GeometryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Point" => Ok(Self::Point),
            "LineString" => Ok(Self::LineString),
            "Polygon" => Ok(Self::Polygon),
            other => Err(GeometryError::Decode {
                reason: format!("unsupported geometry type {other:?}"),
            }),
        }
    }
}

/// Geometry in its persisted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGeometry {
    /// Spatial reference identifier; always [`SRID_WGS84`] when produced by
    /// this module.
    pub srid: i32,
    /// Geometry type recorded alongside the payload.
    pub kind: GeometryKind,
    /// Well-known binary encoding of the coordinates.
    pub wkb: Vec<u8>,
}

/// Errors raised while encoding or decoding geometry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The input is not a well-formed GeoJSON Point, LineString or Polygon.
    #[error("invalid geometry: {reason}")]
    Invalid {
        /// Human readable description of the defect.
        reason: String,
    },
    /// The stored payload could not be turned back into a geometry.
    #[error("failed to decode stored geometry: {reason}")]
    Decode {
        /// Human readable description of the defect.
        reason: String,
    },
}

impl GeometryError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// Encode a GeoJSON geometry object for storage.
///
/// # Examples
/// ```
/// use mapedit_core::geometry::{GeometryKind, SRID_WGS84, decode, encode};
/// use serde_json::json;
///
/// let stored = encode(&json!({"type": "Point", "coordinates": [13.4, 52.5]}))
///     .expect("valid point");
/// assert_eq!(stored.srid, SRID_WGS84);
/// assert_eq!(stored.kind, GeometryKind::Point);
///
/// let geometry = decode(&stored).expect("decodable point");
/// assert_eq!(geometry.value, geojson::Value::Point(vec![13.4, 52.5]));
/// ```
pub fn encode(value: &Value) -> Result<StoredGeometry, GeometryError> {
    if !value.is_object() {
        return Err(GeometryError::invalid("geometry must be a JSON object"));
    }
    let geometry: geojson::Geometry = serde_json::from_value(value.clone())
        .map_err(|err| GeometryError::invalid(err.to_string()))?;
    let geometry = from_geojson(&geometry.value)?;
    encode_geometry(&geometry)
}

/// Encode an already-built geometry for storage.
///
/// The geometry passes the same checks as GeoJSON input: coordinates must be
/// finite WGS84 degrees, line strings need two positions and polygon rings
/// four positions with matching ends.
pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<StoredGeometry, GeometryError> {
    let kind = GeometryKind::of(geometry).ok_or_else(|| {
        GeometryError::invalid("only Point, LineString and Polygon geometries are supported")
    })?;
    validate(geometry)?;
    let wkb = wkb::geom_to_wkb(geometry)
        .map_err(|err| GeometryError::invalid(format!("WKB encoding failed: {err:?}")))?;
    Ok(StoredGeometry {
        srid: SRID_WGS84,
        kind,
        wkb,
    })
}

/// Decode a stored geometry into a GeoJSON geometry object.
pub fn decode(stored: &StoredGeometry) -> Result<geojson::Geometry, GeometryError> {
    if stored.srid != SRID_WGS84 {
        return Err(GeometryError::decode(format!(
            "expected SRID {SRID_WGS84}, found {}",
            stored.srid
        )));
    }
    let mut reader = stored.wkb.as_slice();
    let geometry = wkb::wkb_to_geom(&mut reader)
        .map_err(|err| GeometryError::decode(format!("malformed WKB: {err:?}")))?;

    let kind = GeometryKind::of(&geometry)
        .ok_or_else(|| GeometryError::decode("unsupported geometry type in WKB payload"))?;
    if kind != stored.kind {
        return Err(GeometryError::decode(format!(
            "payload holds a {kind} but the row records a {}",
            stored.kind
        )));
    }

    Ok(geojson::Geometry::new(to_geojson(&geometry)?))
}

fn from_geojson(value: &geojson::Value) -> Result<Geometry<f64>, GeometryError> {
    match value {
        geojson::Value::Point(position) => Ok(Geometry::Point(Point::from(coord(position)?))),
        geojson::Value::LineString(positions) => Ok(Geometry::LineString(line(positions)?)),
        geojson::Value::Polygon(rings) => {
            let mut rings = rings.iter().map(|ring| line(ring));
            let exterior = rings
                .next()
                .ok_or_else(|| GeometryError::invalid("polygon requires an exterior ring"))??;
            let interiors = rings.collect::<Result<Vec<_>, _>>()?;
            for ring in std::iter::once(&exterior).chain(&interiors) {
                if !ring.is_closed() {
                    return Err(GeometryError::invalid("polygon rings must be closed"));
                }
            }
            Ok(Geometry::Polygon(Polygon::new(exterior, interiors)))
        }
        other => Err(GeometryError::invalid(format!(
            "unsupported geometry type {:?}",
            other.type_name()
        ))),
    }
}

/// Stored positions are two-dimensional; an altitude is rejected.
fn coord(position: &[f64]) -> Result<Coord<f64>, GeometryError> {
    match position {
        [x, y] => Ok(Coord { x: *x, y: *y }),
        [_, _, _] => Err(GeometryError::invalid(
            "positions with an altitude are not supported",
        )),
        _ => Err(GeometryError::invalid(format!(
            "positions need two numbers, found {}",
            position.len()
        ))),
    }
}

fn line(positions: &[Vec<f64>]) -> Result<LineString<f64>, GeometryError> {
    positions
        .iter()
        .map(|position| coord(position))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn validate(geometry: &Geometry<f64>) -> Result<(), GeometryError> {
    match geometry {
        Geometry::Point(point) => validate_coord(point.0),
        Geometry::LineString(line) => {
            if line.0.len() < 2 {
                return Err(GeometryError::invalid(
                    "line strings need at least two positions",
                ));
            }
            line.coords().try_for_each(|c| validate_coord(*c))
        }
        Geometry::Polygon(polygon) => {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .try_for_each(validate_ring)
        }
        _ => Err(GeometryError::invalid("unsupported geometry type")),
    }
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), GeometryError> {
    if ring.0.len() < 4 {
        return Err(GeometryError::invalid(
            "polygon rings need at least four positions",
        ));
    }
    if !ring.is_closed() {
        return Err(GeometryError::invalid("polygon rings must be closed"));
    }
    ring.coords().try_for_each(|c| validate_coord(*c))
}

fn validate_coord(coord: Coord<f64>) -> Result<(), GeometryError> {
    let Coord { x: lon, y: lat } = coord;
    if lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
    {
        Ok(())
    } else {
        Err(GeometryError::invalid(format!(
            "coordinate ({lon}, {lat}) is outside WGS84 bounds"
        )))
    }
}

fn to_geojson(geometry: &Geometry<f64>) -> Result<geojson::Value, GeometryError> {
    fn position(coord: &Coord<f64>) -> Vec<f64> {
        vec![coord.x, coord.y]
    }
    fn positions(line: &LineString<f64>) -> Vec<Vec<f64>> {
        line.coords().map(position).collect()
    }

    match geometry {
        Geometry::Point(point) => Ok(geojson::Value::Point(position(&point.0))),
        Geometry::LineString(line) => Ok(geojson::Value::LineString(positions(line))),
        Geometry::Polygon(polygon) => Ok(geojson::Value::Polygon(
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(positions)
                .collect(),
        )),
        _ => Err(GeometryError::decode("unsupported geometry type")),
    }
}
