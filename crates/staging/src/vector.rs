//! Vector feature subsetting against the AOI.
//!
//! Two passes: a coarse bounding-rectangle prefilter (the feature's own
//! `bbox` member when declared, else a computed rectangle) against the
//! AOI's bounding rectangle, then an exact intersection test against the
//! unioned AOI geometry.

use std::path::Path;

use geo::BoundingRect;
use geojson::{Feature, FeatureCollection, GeoJson};
use tracing::debug;

use aoi_common::{BoundingBox, StageError, StageResult};
use footprint::AoiGeometry;

/// Feature counts from one subsetting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetStats {
    pub source: usize,
    pub kept: usize,
}

/// Subset a GeoJSON FeatureCollection to the features intersecting the AOI.
pub fn subset_features(
    raw: &[u8],
    aoi: &AoiGeometry,
) -> StageResult<(FeatureCollection, SubsetStats)> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| StageError::Configuration(format!("vector source is not UTF-8: {e}")))?;
    let parsed: GeoJson = text
        .parse()
        .map_err(|e| StageError::Configuration(format!("invalid vector GeoJSON: {e}")))?;

    let collection = match parsed {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(StageError::Configuration(
                "vector source must be a FeatureCollection".into(),
            ))
        }
    };

    let source = collection.features.len();
    let aoi_bounds = rect_to_bbox(aoi.bounds());

    let kept: Vec<Feature> = collection
        .features
        .into_iter()
        .filter(|feature| coarse_hit(feature, &aoi_bounds))
        .filter(|feature| exact_hit(feature, aoi))
        .collect();

    let stats = SubsetStats {
        source,
        kept: kept.len(),
    };
    debug!(source = stats.source, kept = stats.kept, "subset vector features");

    Ok((
        FeatureCollection {
            bbox: None,
            features: kept,
            foreign_members: None,
        },
        stats,
    ))
}

/// Write a subset collection as GeoJSON. An empty collection is valid
/// output.
pub fn write_subset(collection: FeatureCollection, dest: &Path) -> StageResult<()> {
    let payload = GeoJson::from(collection).to_string();
    std::fs::write(dest, payload)?;
    Ok(())
}

fn rect_to_bbox(rect: geo::Rect<f64>) -> BoundingBox {
    BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

fn coarse_hit(feature: &Feature, aoi_bounds: &BoundingBox) -> bool {
    if let Some(declared) = feature.bbox.as_deref().and_then(bbox_from_members) {
        return declared.intersects(aoi_bounds);
    }

    match feature_geometry(feature) {
        Some(geometry) => geometry
            .bounding_rect()
            .map(|rect| rect_to_bbox(rect).intersects(aoi_bounds))
            .unwrap_or(false),
        None => false,
    }
}

fn bbox_from_members(raw: &[f64]) -> Option<BoundingBox> {
    if raw.len() >= 4 {
        Some(BoundingBox::new(raw[0], raw[1], raw[2], raw[3]))
    } else {
        None
    }
}

fn exact_hit(feature: &Feature, aoi: &AoiGeometry) -> bool {
    feature_geometry(feature)
        .map(|geometry| aoi.intersects_geometry(&geometry))
        .unwrap_or(false)
}

fn feature_geometry(feature: &Feature) -> Option<geo::Geometry<f64>> {
    let geometry = feature.geometry.as_ref()?;
    geo::Geometry::<f64>::try_from(geometry.value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Intersects;
    use test_utils::aoi_geojson;

    fn aoi() -> AoiGeometry {
        AoiGeometry::from_geojson(&aoi_geojson(0.0, 0.0, 10.0, 10.0)).unwrap()
    }

    fn square_feature(min_x: f64, min_y: f64, size: f64) -> String {
        format!(
            concat!(
                r#"{{"type":"Feature","properties":{{"name":"sq"}},"#,
                r#""geometry":{{"type":"Polygon","coordinates":"#,
                r#"[[[{0},{1}],[{2},{1}],[{2},{3}],[{0},{3}],[{0},{1}]]]}}}}"#
            ),
            min_x,
            min_y,
            min_x + size,
            min_y + size
        )
    }

    fn collection(features: &[String]) -> Vec<u8> {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
        .into_bytes()
    }

    #[test]
    fn test_kept_count_matches_independent_check() {
        let features = vec![
            square_feature(1.0, 1.0, 2.0),   // inside
            square_feature(8.0, 8.0, 5.0),   // straddles the boundary
            square_feature(50.0, 50.0, 2.0), // far away
            square_feature(-5.0, -5.0, 3.0), // ends at (-2,-2), disjoint
        ];
        let raw = collection(&features);

        let target = aoi();
        let (subset, stats) = subset_features(&raw, &target).unwrap();
        assert_eq!(stats.source, 4);
        assert!(stats.kept <= stats.source);
        assert_eq!(subset.features.len(), stats.kept);

        // independent verification against the same AOI geometry
        let expected = raw_intersection_count(&raw, &target);
        assert_eq!(stats.kept, expected);
        assert_eq!(stats.kept, 2);
    }

    fn raw_intersection_count(raw: &[u8], aoi: &AoiGeometry) -> usize {
        let text = std::str::from_utf8(raw).unwrap();
        let GeoJson::FeatureCollection(fc) = text.parse().unwrap() else {
            panic!("fixture must be a collection");
        };
        fc.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| geo::Geometry::<f64>::try_from(g.value.clone()).ok())
            .filter(|g| aoi.intersects_geometry(g))
            .count()
    }

    #[test]
    fn test_declared_bbox_is_honored() {
        // declared bbox far away, so the coarse pass drops the feature
        // without looking at the geometry
        let feature = format!(
            concat!(
                r#"{{"type":"Feature","bbox":[100.0,100.0,101.0,101.0],"properties":{{}},"#,
                r#""geometry":{{"type":"Polygon","coordinates":"#,
                r#"[[[1,1],[2,1],[2,2],[1,2],[1,1]]]}}}}"#
            ),
        );
        let raw = collection(&[feature]);
        let (_, stats) = subset_features(&raw, &aoi()).unwrap();
        assert_eq!(stats.kept, 0);
    }

    #[test]
    fn test_empty_subset_is_valid_output() {
        let raw = collection(&[square_feature(50.0, 50.0, 1.0)]);
        let (subset, stats) = subset_features(&raw, &aoi()).unwrap();
        assert_eq!(stats.kept, 0);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.geojson");
        write_subset(subset, &dest).unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        let reparsed: GeoJson = written.parse().unwrap();
        let GeoJson::FeatureCollection(fc) = reparsed else {
            panic!("subset must stay a collection");
        };
        assert!(fc.features.is_empty());
    }

    #[test]
    fn test_boundary_touch_survives_both_passes() {
        let raw = collection(&[square_feature(10.0, 0.0, 2.0)]);
        let target = aoi();
        let (_, stats) = subset_features(&raw, &target).unwrap();
        assert_eq!(stats.kept, 1);

        // sanity: geo agrees the geometries touch
        let edge: geo::Polygon<f64> = geo::Polygon::new(
            geo::LineString::from(vec![
                (10.0, 0.0),
                (12.0, 0.0),
                (12.0, 2.0),
                (10.0, 2.0),
                (10.0, 0.0),
            ]),
            vec![],
        );
        let aoi_rect: geo::Polygon<f64> = geo::Polygon::new(
            geo::LineString::from(vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 10.0),
                (0.0, 10.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        assert!(edge.intersects(&aoi_rect));
    }

    #[test]
    fn test_not_geojson_is_a_configuration_error() {
        let result = subset_features(b"PK\x03\x04 not json", &aoi());
        assert!(matches!(result, Err(StageError::Configuration(_))));
    }
}
