//! Classification of Overpass elements and mapping onto feature drafts.

use geo::{Coord, Geometry, LineString, Point, Polygon};
use mapedit_core::geometry::{GeometryError, encode_geometry};
use mapedit_core::{FeatureAttributes, FeatureDraft, Properties};
use serde_json::Value;
use thiserror::Error;

use super::OsmCategory;
use super::tags::{
    default_road_name, direction_from_oneway, parse_count, parse_height, parse_speed,
};
use crate::overpass::{ElementKind, LatLon, OverpassElement};

const STREETLIGHT_KEYS: [&str; 4] = ["highway", "amenity", "man_made", "lighting"];

const STREETLIGHT_DESCRIPTIVE_TAGS: [&str; 8] = [
    "lamp_mount",
    "lamp_type",
    "light_source",
    "light:colour",
    "light:count",
    "operator",
    "ref",
    "support",
];

/// Why an element was left out of an import.
#[derive(Debug, Error)]
pub(super) enum Unmappable {
    #[error("{kind} elements do not belong to {category}")]
    WrongKind {
        kind: &'static str,
        category: OsmCategory,
    },
    #[error("tags do not describe {category}")]
    Unclassified { category: OsmCategory },
    #[error("node has no coordinates")]
    MissingPosition,
    #[error("only {found} usable positions")]
    TooFewPositions { found: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Map `element` onto a draft for `category`.
pub(super) fn map_element(
    category: OsmCategory,
    element: &OverpassElement,
) -> Result<FeatureDraft, Unmappable> {
    match category {
        OsmCategory::Buildings => map_building(element),
        OsmCategory::Roads => map_road(element),
        OsmCategory::Streetlights => map_streetlight(element),
        OsmCategory::TrafficLights => map_traffic_light(element),
    }
}

fn map_building(element: &OverpassElement) -> Result<FeatureDraft, Unmappable> {
    let category = OsmCategory::Buildings;
    if !matches!(element.kind, ElementKind::Way | ElementKind::Relation) {
        return Err(wrong_kind(element, category));
    }
    let Some(building) = element.tag("building") else {
        return Err(Unmappable::Unclassified { category });
    };

    let outline = match element.kind {
        ElementKind::Relation => element
            .members
            .iter()
            .find(|member| member.role == "outer" && !member.geometry.is_empty())
            .map(|member| coords(&member.geometry))
            .unwrap_or_default(),
        _ => coords(&element.geometry),
    };
    let ring = closed_ring(outline)?;
    let geometry = encode_geometry(&Geometry::Polygon(Polygon::new(ring, Vec::new())))?;

    let mut properties = provenance(element, category);
    properties.insert("osm_tags".to_owned(), tag_object(element));

    Ok(FeatureDraft {
        name: element.tag("name").map(str::to_owned),
        description: None,
        geometry,
        properties,
        attributes: FeatureAttributes {
            building_number: element.tag("addr:housenumber").map(str::to_owned),
            building_type: Some(if building.is_empty() { "yes" } else { building }.to_owned()),
            osm_id: Some(element.id.to_string()),
            ..FeatureAttributes::default()
        },
    })
}

fn map_road(element: &OverpassElement) -> Result<FeatureDraft, Unmappable> {
    let category = OsmCategory::Roads;
    if element.kind != ElementKind::Way {
        return Err(wrong_kind(element, category));
    }
    let Some(highway) = element.tag("highway") else {
        return Err(Unmappable::Unclassified { category });
    };

    let positions = coords(&element.geometry);
    if positions.len() < 2 {
        return Err(Unmappable::TooFewPositions {
            found: positions.len(),
        });
    }
    let geometry = encode_geometry(&Geometry::LineString(LineString::new(positions)))?;

    let mut properties = provenance(element, category);
    properties.insert("osm_tags".to_owned(), tag_object(element));

    let name = element
        .tag("name")
        .map_or_else(|| default_road_name(highway), str::to_owned);

    Ok(FeatureDraft {
        name: Some(name),
        description: None,
        geometry,
        properties,
        attributes: FeatureAttributes {
            osm_id: Some(element.id.to_string()),
            road_type: Some(highway.to_owned()),
            direction: Some(direction_from_oneway(element.tag("oneway"))),
            lane_count: element.tag("lanes").and_then(parse_count),
            max_speed: element.tag("maxspeed").and_then(parse_speed),
            surface: element.tag("surface").map(str::to_owned),
            ..FeatureAttributes::default()
        },
    })
}

fn map_streetlight(element: &OverpassElement) -> Result<FeatureDraft, Unmappable> {
    let category = OsmCategory::Streetlights;
    if element.kind != ElementKind::Node {
        return Err(wrong_kind(element, category));
    }
    if !STREETLIGHT_KEYS
        .iter()
        .any(|key| element.tag_is(key, "street_lamp"))
    {
        return Err(Unmappable::Unclassified { category });
    }
    let geometry = node_geometry(element)?;

    let light_type = element
        .tag("lamp_type")
        .or_else(|| element.tag("light_source"))
        .unwrap_or("street_lamp");

    let mut properties = provenance(element, category);
    properties.insert("light_type".to_owned(), Value::from(light_type));
    if let Some(height) = element.tag("height").and_then(parse_height) {
        properties.insert("height".to_owned(), Value::from(height));
    }
    for key in STREETLIGHT_DESCRIPTIVE_TAGS {
        if let Some(value) = element.tag(key) {
            properties.insert(key.to_owned(), Value::from(value));
        }
    }

    Ok(FeatureDraft {
        name: Some(format!("Street Light ({light_type})")),
        description: None,
        geometry,
        properties,
        attributes: FeatureAttributes {
            icon: Some("💡".to_owned()),
            osm_id: Some(element.id.to_string()),
            ..FeatureAttributes::default()
        },
    })
}

fn map_traffic_light(element: &OverpassElement) -> Result<FeatureDraft, Unmappable> {
    let category = OsmCategory::TrafficLights;
    if element.kind != ElementKind::Node {
        return Err(wrong_kind(element, category));
    }
    if !(element.tag_is("highway", "traffic_signals")
        || element.tag_is("traffic_signals", "signal")
        || element.tag_is("amenity", "traffic_light"))
    {
        return Err(Unmappable::Unclassified { category });
    }
    let geometry = node_geometry(element)?;

    let mut properties = provenance(element, category);
    for (property, tag) in [
        ("pedestrian_signals", "traffic_signals:pedestrian"),
        ("sound_signals", "traffic_signals:sound"),
        ("vibration_signals", "traffic_signals:vibration"),
    ] {
        properties.insert(property.to_owned(), Value::Bool(element.tag_is(tag, "yes")));
    }
    if let Some(cycle_time) = element.tag("cycle_time").and_then(parse_count) {
        properties.insert("cycle_time".to_owned(), Value::from(cycle_time));
    }

    let name = element
        .tag("ref")
        .map_or_else(|| "Traffic Light".to_owned(), |r| format!("Traffic Light {r}"));

    Ok(FeatureDraft {
        name: Some(name),
        description: None,
        geometry,
        properties,
        attributes: FeatureAttributes {
            icon: Some("🚦".to_owned()),
            osm_id: Some(element.id.to_string()),
            ..FeatureAttributes::default()
        },
    })
}

fn wrong_kind(element: &OverpassElement, category: OsmCategory) -> Unmappable {
    Unmappable::WrongKind {
        kind: element.kind.as_str(),
        category,
    }
}

fn coords(positions: &[Option<LatLon>]) -> Vec<Coord<f64>> {
    positions
        .iter()
        .flatten()
        .map(|p| Coord { x: p.lon, y: p.lat })
        .collect()
}

/// Close `positions` into a ring by repeating the first position if needed.
fn closed_ring(mut positions: Vec<Coord<f64>>) -> Result<LineString<f64>, Unmappable> {
    if let (Some(first), Some(last)) = (positions.first().copied(), positions.last().copied())
        && first != last
    {
        positions.push(first);
    }
    if positions.len() < 4 {
        return Err(Unmappable::TooFewPositions {
            found: positions.len(),
        });
    }
    Ok(LineString::new(positions))
}

fn node_geometry(
    element: &OverpassElement,
) -> Result<mapedit_core::StoredGeometry, Unmappable> {
    let (Some(lat), Some(lon)) = (element.lat, element.lon) else {
        return Err(Unmappable::MissingPosition);
    };
    Ok(encode_geometry(&Geometry::Point(Point::new(lon, lat)))?)
}

fn provenance(element: &OverpassElement, category: OsmCategory) -> Properties {
    let mut properties = Properties::new();
    properties.insert("source".to_owned(), Value::from("openstreetmap"));
    properties.insert("osm_type".to_owned(), Value::from(element.kind.as_str()));
    properties.insert(
        "feature_type".to_owned(),
        Value::from(category.feature_type()),
    );
    properties
}

fn tag_object(element: &OverpassElement) -> Value {
    Value::Object(
        element
            .tags
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
            .collect(),
    )
}
