//! Tag parsing helpers for OSM import.
//!
//! Values that cannot be parsed yield `None` so callers can omit the
//! corresponding column instead of failing the element.
use mapedit_core::Direction;

/// Parse a `maxspeed` value such as `30`, `30 mph` or `50 km/h`.
pub(super) fn parse_speed(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let number = trimmed
        .strip_suffix(" mph")
        .or_else(|| trimmed.strip_suffix(" km/h"))
        .unwrap_or(trimmed);
    parse_count(number)
}

/// Parse a non-negative integer such as `lanes` or `cycle_time`.
pub(super) fn parse_count(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Parse a `height` value such as `8`, `8m` or `6.5 m`.
pub(super) fn parse_height(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != 'm' && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|height| height.is_finite())
}

/// Map an OSM `oneway` value onto a travel direction.
pub(super) fn direction_from_oneway(value: Option<&str>) -> Direction {
    match value {
        Some("yes") => Direction::Oneway,
        Some("-1") => Direction::OnewayReverse,
        _ => Direction::Bidirectional,
    }
}

/// Default road name derived from its `highway` value, e.g.
/// `living_street` becomes `Living Street Road`.
pub(super) fn default_road_name(highway: &str) -> String {
    format!("{} Road", title_case(&highway.replace('_', " ")))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(value: &str) -> String {
    let mut titled = String::with_capacity(value.len());
    let mut previous_alphabetic = false;
    for c in value.chars() {
        if previous_alphabetic {
            titled.extend(c.to_lowercase());
        } else {
            titled.extend(c.to_uppercase());
        }
        previous_alphabetic = c.is_alphabetic();
    }
    titled
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("30", Some(30))]
    #[case("30 mph", Some(30))]
    #[case("50 km/h", Some(50))]
    #[case(" 20 ", Some(20))]
    #[case("fast", None)]
    #[case("-5", None)]
    #[case("", None)]
    fn parses_speed_limits(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_speed(input), expected);
    }

    #[rstest]
    #[case("8", Some(8.0))]
    #[case("8m", Some(8.0))]
    #[case("6.5 m", Some(6.5))]
    #[case("tall", None)]
    #[case("inf", None)]
    fn parses_heights(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_height(input), expected);
    }

    #[rstest]
    #[case(Some("yes"), Direction::Oneway)]
    #[case(Some("-1"), Direction::OnewayReverse)]
    #[case(Some("no"), Direction::Bidirectional)]
    #[case(None, Direction::Bidirectional)]
    fn maps_oneway_values(#[case] input: Option<&str>, #[case] expected: Direction) {
        assert_eq!(direction_from_oneway(input), expected);
    }

    #[rstest]
    #[case("residential", "Residential Road")]
    #[case("living_street", "Living Street Road")]
    #[case("PRIMARY_link", "Primary Link Road")]
    fn derives_default_road_names(#[case] highway: &str, #[case] expected: &str) {
        assert_eq!(default_road_name(highway), expected);
    }
}
