//! Geo-location builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::Result;
use crate::query::SearchQuery;
use condex_core::geo::{GeoShape, LOCATION_PROPERTY};
use condex_core::{Condition, ExecutionContext};

/// `geoLocationByPointSessionCondition`. Incomplete parameters impose no
/// filter.
pub struct GeoLocationByPointSessionConditionQueryBuilder;

impl ConditionQueryBuilder<SearchQuery> for GeoLocationByPointSessionConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        _context: &ExecutionContext,
        _compiler: &QueryCompiler<SearchQuery>,
    ) -> Result<Option<SearchQuery>> {
        let Some(shape) = GeoShape::from_condition(condition)? else {
            return Ok(None);
        };
        Ok(Some(match shape {
            GeoShape::Circle {
                center,
                radius_meters,
            } => SearchQuery::GeoDistance {
                field: LOCATION_PROPERTY.to_string(),
                center,
                distance_meters: radius_meters,
            },
            GeoShape::Rectangle {
                north_east,
                south_west,
            } => SearchQuery::GeoBoundingBox {
                field: LOCATION_PROPERTY.to_string(),
                north_east,
                south_west,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::test_support::builtin_compiler;
    use crate::error::CompileError;
    use crate::query::SearchQuery;
    use condex_core::geo::GeoPoint;
    use condex_core::{Condition, ConditionBuilder, ExecutionContext};

    #[test]
    fn test_circle() {
        let condition = ConditionBuilder::geo_circle(48.8566, 2.3522, "10km");
        let query = builtin_compiler()
            .compile(&condition, &ExecutionContext::new())
            .unwrap();
        assert_eq!(
            query,
            Some(SearchQuery::GeoDistance {
                field: "properties.location".to_string(),
                center: GeoPoint::new(48.8566, 2.3522),
                distance_meters: 10_000.0,
            })
        );
    }

    #[test]
    fn test_missing_distance_is_unfiltered() {
        let condition = Condition::new("geoLocationByPointSessionCondition")
            .with_parameter("type", "circle")
            .with_parameter("circleLatitude", 48.8566)
            .with_parameter("circleLongitude", 2.3522);
        let query = builtin_compiler()
            .compile(&condition, &ExecutionContext::new())
            .unwrap();
        assert_eq!(query, None);
    }

    #[test]
    fn test_unknown_type() {
        let condition =
            Condition::new("geoLocationByPointSessionCondition").with_parameter("type", "polygon");
        let err = builtin_compiler()
            .compile(&condition, &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidParameter { ref parameter, .. } if parameter == "type"));
    }
}
