//! Geo primitives shared by the geo evaluator, the geo query builder and the
//! in-memory backend

use crate::condition::Condition;
use crate::error::{CoreError, Result};
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Session property holding the visitor's location
pub const LOCATION_PROPERTY: &str = "properties.location";

/// Mean earth radius in metres
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.7714;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Read a point from `{lat, lon}` or a `"lat,lon"` string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(
                map.get("lat").and_then(Value::as_f64)?,
                map.get("lon").and_then(Value::as_f64)?,
            )),
            Value::String(s) => {
                let (lat, lon) = s.split_once(',')?;
                Some(Self::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
            }
            _ => None,
        }
    }

    /// Great-circle distance in metres (haversine)
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_MEAN_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Inside the box spanned by the north-east and south-west corners,
    /// edges included. A box whose west edge is east of its east edge wraps
    /// the antimeridian.
    pub fn within_box(&self, north_east: &GeoPoint, south_west: &GeoPoint) -> bool {
        if self.lat > north_east.lat || self.lat < south_west.lat {
            return false;
        }
        if south_west.lon <= north_east.lon {
            self.lon >= south_west.lon && self.lon <= north_east.lon
        } else {
            self.lon >= south_west.lon || self.lon <= north_east.lon
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
    Yards,
    Feet,
    Inches,
    NauticalMiles,
}

impl DistanceUnit {
    /// Parse a unit suffix; the empty suffix is metres
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let unit = match suffix.trim().to_ascii_lowercase().as_str() {
            "" | "m" | "meters" => DistanceUnit::Meters,
            "km" | "kilometers" => DistanceUnit::Kilometers,
            "mi" | "miles" => DistanceUnit::Miles,
            "yd" | "yards" => DistanceUnit::Yards,
            "ft" | "feet" => DistanceUnit::Feet,
            "in" | "inch" => DistanceUnit::Inches,
            "nm" | "nmi" => DistanceUnit::NauticalMiles,
            _ => return None,
        };
        Some(unit)
    }

    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.344,
            DistanceUnit::Yards => 0.9144,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::Inches => 0.0254,
            DistanceUnit::NauticalMiles => 1852.0,
        }
    }
}

/// Parse a distance such as `"10km"`, `"500"` or `"2.5 mi"` into metres
pub fn parse_distance(input: &str) -> Option<f64> {
    let input = input.trim();
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(input.len());
    let (number, suffix) = input.split_at(split);
    let amount: f64 = number.parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Some(amount * DistanceUnit::from_suffix(suffix)?.meters_per_unit())
}

/// Distance parameter as metres: strings carry a unit, numbers are metres
pub fn distance_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_distance(s),
        Value::Number(n) if n.is_finite() && *n >= 0.0 => Some(*n),
        _ => None,
    }
}

/// Area selected by a geo condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoShape {
    Circle { center: GeoPoint, radius_meters: f64 },
    Rectangle { north_east: GeoPoint, south_west: GeoPoint },
}

impl GeoShape {
    /// Shape of a geo condition. `Ok(None)` when the parameters of the
    /// selected mode are incomplete; an unknown mode or an unreadable
    /// distance is an error.
    pub fn from_condition(condition: &Condition) -> Result<Option<Self>> {
        let invalid = |parameter: &str, message: String| {
            CoreError::invalid_parameter(&condition.condition_type_id, parameter, message)
        };
        match condition.string_parameter("type") {
            Some("circle") => {
                let (Some(lat), Some(lon), Some(distance)) = (
                    condition.f64_parameter("circleLatitude"),
                    condition.f64_parameter("circleLongitude"),
                    condition.parameter("distance"),
                ) else {
                    return Ok(None);
                };
                let radius_meters = distance_from_value(distance)
                    .ok_or_else(|| invalid("distance", format!("unreadable distance '{}'", distance)))?;
                Ok(Some(GeoShape::Circle {
                    center: GeoPoint::new(lat, lon),
                    radius_meters,
                }))
            }
            Some("rectangle") => {
                let (Some(ne_lat), Some(ne_lon), Some(sw_lat), Some(sw_lon)) = (
                    condition.f64_parameter("rectangleLatitudeNE"),
                    condition.f64_parameter("rectangleLongitudeNE"),
                    condition.f64_parameter("rectangleLatitudeSW"),
                    condition.f64_parameter("rectangleLongitudeSW"),
                ) else {
                    return Ok(None);
                };
                Ok(Some(GeoShape::Rectangle {
                    north_east: GeoPoint::new(ne_lat, ne_lon),
                    south_west: GeoPoint::new(sw_lat, sw_lon),
                }))
            }
            None => Ok(None),
            Some(other) => Err(invalid(
                "type",
                format!("unknown geo type '{}', use 'circle' or 'rectangle'", other),
            )),
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            GeoShape::Circle {
                center,
                radius_meters,
            } => center.distance_meters(point) <= *radius_meters,
            GeoShape::Rectangle {
                north_east,
                south_west,
            } => point.within_box(north_east, south_west),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionBuilder;

    #[test]
    fn test_shape_from_condition() {
        let circle = ConditionBuilder::geo_circle(48.85, 2.35, "10km");
        assert_eq!(
            GeoShape::from_condition(&circle).unwrap(),
            Some(GeoShape::Circle {
                center: GeoPoint::new(48.85, 2.35),
                radius_meters: 10_000.0
            })
        );

        let incomplete = Condition::new("geoLocationByPointSessionCondition")
            .with_parameter("type", "circle");
        assert_eq!(GeoShape::from_condition(&incomplete).unwrap(), None);

        let bad_distance = ConditionBuilder::geo_circle(48.85, 2.35, "far");
        assert!(GeoShape::from_condition(&bad_distance).is_err());

        let unknown = Condition::new("geoLocationByPointSessionCondition")
            .with_parameter("type", "polygon");
        assert!(GeoShape::from_condition(&unknown).is_err());
    }

    #[test]
    fn test_shape_contains() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let versailles = GeoPoint::new(48.8049, 2.1204);
        let circle = GeoShape::Circle {
            center: paris,
            radius_meters: 10_000.0,
        };
        assert!(circle.contains(&paris));
        assert!(!circle.contains(&versailles));

        let rectangle = GeoShape::Rectangle {
            north_east: GeoPoint::new(49.0, 2.5),
            south_west: GeoPoint::new(48.7, 2.0),
        };
        assert!(rectangle.contains(&versailles));
    }

    #[test]
    fn test_parse_distance_units() {
        assert_eq!(parse_distance("10km"), Some(10_000.0));
        assert_eq!(parse_distance("500"), Some(500.0));
        assert_eq!(parse_distance("500m"), Some(500.0));
        assert_eq!(parse_distance("2 mi"), Some(2.0 * 1609.344));
        assert_eq!(parse_distance("1NM"), Some(1852.0));
        assert_eq!(parse_distance("3ft"), Some(3.0 * 0.3048));
        assert_eq!(parse_distance("10parsecs"), None);
        assert_eq!(parse_distance("km"), None);
        assert_eq!(parse_distance("-1km"), None);
    }

    #[test]
    fn test_point_from_value() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("lat".to_string(), Value::from(48.85));
        map.insert("lon".to_string(), Value::from(2.35));
        assert_eq!(
            GeoPoint::from_value(&Value::Object(map)),
            Some(GeoPoint::new(48.85, 2.35))
        );
        assert_eq!(
            GeoPoint::from_value(&Value::from("48.85, 2.35")),
            Some(GeoPoint::new(48.85, 2.35))
        );
        assert_eq!(GeoPoint::from_value(&Value::from("nowhere")), None);
    }

    #[test]
    fn test_haversine_paris_london() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let london = GeoPoint::new(51.5074, -0.1278);
        let d = paris.distance_meters(&london);
        assert!((d - 343_500.0).abs() < 2_000.0, "distance was {}", d);
        assert_eq!(paris.distance_meters(&paris), 0.0);
    }

    #[test]
    fn test_within_box() {
        let ne = GeoPoint::new(49.0, 3.0);
        let sw = GeoPoint::new(48.0, 2.0);
        assert!(GeoPoint::new(48.5, 2.5).within_box(&ne, &sw));
        assert!(GeoPoint::new(49.0, 3.0).within_box(&ne, &sw));
        assert!(!GeoPoint::new(50.0, 2.5).within_box(&ne, &sw));

        let wrap_ne = GeoPoint::new(10.0, -170.0);
        let wrap_sw = GeoPoint::new(-10.0, 170.0);
        assert!(GeoPoint::new(0.0, 179.0).within_box(&wrap_ne, &wrap_sw));
        assert!(!GeoPoint::new(0.0, 0.0).within_box(&wrap_ne, &wrap_sw));
    }
}
