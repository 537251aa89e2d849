//! AOI geometry loading and index filtering.

use std::fs;
use std::path::Path;

use geo::algorithm::bool_ops::unary_union;
use geo::{BoundingRect, Intersects, MultiPolygon, Polygon, Rect};
use geojson::GeoJson;
use tracing::warn;

use aoi_common::{StageError, StageResult};

use crate::index::SpatialIndex;

/// Result of intersecting a spatial index with the AOI.
///
/// An empty index and a non-intersecting index are distinct outcomes, not
/// one collapsed sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The index had no records to test.
    NoCandidates,
    /// Records existed but none intersected the AOI.
    NoIntersection,
    /// Paths whose footprint intersects the AOI; boundary touching counts.
    Matches(Vec<String>),
}

/// The run's area of interest, unioned once and shared read-only.
#[derive(Debug, Clone)]
pub struct AoiGeometry {
    geometry: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl AoiGeometry {
    /// Load and union all areal features of an AOI GeoJSON file.
    pub fn from_path(path: &Path) -> StageResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            StageError::Configuration(format!("cannot read AOI {}: {e}", path.display()))
        })?;
        Self::from_geojson(&raw)
    }

    /// Build from raw GeoJSON text (FeatureCollection, Feature or bare
    /// geometry). Non-areal geometries are skipped with a warning.
    pub fn from_geojson(raw: &str) -> StageResult<Self> {
        let parsed: GeoJson = raw
            .parse()
            .map_err(|e| StageError::Configuration(format!("invalid AOI GeoJSON: {e}")))?;

        let mut polygons: Vec<Polygon<f64>> = Vec::new();
        match parsed {
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    if let Some(geometry) = feature.geometry {
                        collect_polygons(geometry.value, &mut polygons)?;
                    }
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = feature.geometry {
                    collect_polygons(geometry.value, &mut polygons)?;
                }
            }
            GeoJson::Geometry(geometry) => collect_polygons(geometry.value, &mut polygons)?,
        }

        if polygons.is_empty() {
            return Err(StageError::Configuration(
                "AOI contains no polygon features".into(),
            ));
        }

        let geometry = unary_union(&polygons);
        let bounds = geometry
            .bounding_rect()
            .ok_or_else(|| StageError::Configuration("AOI has no extent".into()))?;

        Ok(Self { geometry, bounds })
    }

    /// Bounding rectangle of the unioned AOI, for coarse prefilters.
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// Exact intersection test against the unioned geometry.
    pub fn intersects_geometry(&self, geometry: &geo::Geometry<f64>) -> bool {
        geometry.intersects(&self.geometry)
    }

    /// Intersect a spatial index, preserving input order among matches.
    pub fn filter(&self, index: &SpatialIndex) -> FilterOutcome {
        if index.is_empty() {
            return FilterOutcome::NoCandidates;
        }

        let matches: Vec<String> = index
            .iter()
            .filter(|record| record.geometry.intersects(&self.geometry))
            .map(|record| record.path.clone())
            .collect();

        if matches.is_empty() {
            FilterOutcome::NoIntersection
        } else {
            FilterOutcome::Matches(matches)
        }
    }
}

fn collect_polygons(
    value: geojson::Value,
    sink: &mut Vec<Polygon<f64>>,
) -> StageResult<()> {
    match geo::Geometry::<f64>::try_from(value) {
        Ok(geo::Geometry::Polygon(polygon)) => sink.push(polygon),
        Ok(geo::Geometry::MultiPolygon(multi)) => sink.extend(multi.0),
        Ok(other) => {
            warn!(kind = geometry_kind(&other), "ignoring non-areal AOI geometry");
        }
        Err(e) => {
            return Err(StageError::Configuration(format!(
                "unusable AOI geometry: {e}"
            )))
        }
    }
    Ok(())
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "point",
        geo::Geometry::Line(_) => "line",
        geo::Geometry::LineString(_) => "linestring",
        geo::Geometry::MultiPoint(_) => "multipoint",
        geo::Geometry::MultiLineString(_) => "multilinestring",
        geo::Geometry::GeometryCollection(_) => "geometrycollection",
        geo::Geometry::Rect(_) => "rect",
        geo::Geometry::Triangle(_) => "triangle",
        geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_) => "areal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SpatialIndexRecord;
    use geo::{LineString, Polygon};

    fn square(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (min_x + size, min_y),
                (min_x + size, min_y + size),
                (min_x, min_y + size),
                (min_x, min_y),
            ]),
            vec![],
        )
    }

    fn record(path: &str, min_x: f64, min_y: f64, size: f64) -> SpatialIndexRecord {
        SpatialIndexRecord {
            geometry: square(min_x, min_y, size),
            path: path.to_string(),
        }
    }

    fn unit_aoi() -> AoiGeometry {
        AoiGeometry::from_geojson(&test_utils::aoi_geojson(0.0, 0.0, 10.0, 10.0)).unwrap()
    }

    #[test]
    fn test_empty_index_reports_no_candidates() {
        let aoi = unit_aoi();
        assert_eq!(aoi.filter(&Vec::new()), FilterOutcome::NoCandidates);
    }

    #[test]
    fn test_disjoint_index_reports_no_intersection() {
        let aoi = unit_aoi();
        let index = vec![record("far.tif", 100.0, 100.0, 1.0)];
        assert_eq!(aoi.filter(&index), FilterOutcome::NoIntersection);
    }

    #[test]
    fn test_boundary_touch_counts_as_match() {
        let aoi = unit_aoi();
        let index = vec![record("touching.tif", 10.0, 0.0, 1.0)];
        assert_eq!(
            aoi.filter(&index),
            FilterOutcome::Matches(vec!["touching.tif".to_string()])
        );
    }

    #[test]
    fn test_filter_is_idempotent_on_contained_sets() {
        let aoi = unit_aoi();
        let index = vec![
            record("a.tif", 1.0, 1.0, 2.0),
            record("b.tif", 4.0, 4.0, 2.0),
            record("c.tif", 7.0, 7.0, 2.0),
        ];

        let first = match aoi.filter(&index) {
            FilterOutcome::Matches(paths) => paths,
            other => panic!("expected matches, got {other:?}"),
        };
        assert_eq!(first.len(), index.len());

        let contained: SpatialIndex = index
            .iter()
            .filter(|r| first.contains(&r.path))
            .cloned()
            .collect();
        let second = match aoi.filter(&contained) {
            FilterOutcome::Matches(paths) => paths,
            other => panic!("expected matches, got {other:?}"),
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_multiple_aoi_features_are_unioned() {
        let raw = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[5,0],[5,5],[0,5],[0,0]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[20,20],[25,20],[25,25],[20,25],[20,20]]]}}
        ]}"#;
        let aoi = AoiGeometry::from_geojson(raw).unwrap();

        let index = vec![record("west.tif", 1.0, 1.0, 1.0), record("east.tif", 21.0, 21.0, 1.0)];
        assert_eq!(
            aoi.filter(&index),
            FilterOutcome::Matches(vec!["west.tif".to_string(), "east.tif".to_string()])
        );
    }

    #[test]
    fn test_aoi_without_areal_features_is_rejected() {
        let raw = r#"{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,1]}}"#;
        assert!(matches!(
            AoiGeometry::from_geojson(raw),
            Err(StageError::Configuration(_))
        ));
    }
}
