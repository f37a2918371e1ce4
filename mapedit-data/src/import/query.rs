//! Overpass QL query construction.

use mapedit_core::BoundingBox;

use super::OsmCategory;

/// Build the Overpass query fetching `category` inside `bbox`.
///
/// Ways and relations are requested with `out geom` so their coordinates are
/// inlined; nodes use `out body`.
pub(super) fn build_query(category: OsmCategory, bbox: &BoundingBox) -> String {
    let area = format!("({},{},{},{})", bbox.south, bbox.west, bbox.north, bbox.east);
    let (selectors, output): (&[&str], &str) = match category {
        OsmCategory::Buildings => (&[r#"way["building"]"#, r#"relation["building"]"#], "geom"),
        OsmCategory::Roads => (&[r#"way["highway"]"#], "geom"),
        OsmCategory::Streetlights => (
            &[
                r#"node["highway"="street_lamp"]"#,
                r#"node["amenity"="street_lamp"]"#,
                r#"node["man_made"="street_lamp"]"#,
                r#"node["lighting"="street_lamp"]"#,
            ],
            "body",
        ),
        OsmCategory::TrafficLights => (
            &[
                r#"node["highway"="traffic_signals"]"#,
                r#"node["traffic_signals"="signal"]"#,
                r#"node["amenity"="traffic_light"]"#,
            ],
            "body",
        ),
    };

    let mut query = String::from("[out:json][timeout:25];\n(\n");
    for selector in selectors {
        query.push_str("  ");
        query.push_str(selector);
        query.push_str(&area);
        query.push_str(";\n");
    }
    query.push_str(");\nout ");
    query.push_str(output);
    query.push(';');
    query
}
