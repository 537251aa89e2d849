//! Coordinate transforms between EPSG frames, pure Rust.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use aoi_common::{StageError, StageResult};

/// Canonical geographic frame every spatial index is normalized to.
pub const CANONICAL_EPSG: u16 = 4326;

/// PROJ4 definition for an EPSG code, when the code is known.
pub fn proj_string(epsg: u16) -> Option<&'static str> {
    crs_definitions::from_code(epsg).map(|def| def.proj4)
}

/// Whether an EPSG code designates a geographic (lon/lat, degrees) frame.
pub fn is_geographic(epsg: u16) -> bool {
    match proj_string(epsg) {
        Some(def) => def.contains("+proj=longlat"),
        None => epsg == CANONICAL_EPSG,
    }
}

/// A transform between two EPSG frames, built once and applied to many
/// points. Geographic ends are converted to and from radians as the
/// projection engine requires.
pub struct FrameTransform {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl FrameTransform {
    pub fn new(source_epsg: u16, target_epsg: u16) -> StageResult<Self> {
        let source_def = proj_string(source_epsg).ok_or_else(|| {
            StageError::IndexBuild(format!(
                "EPSG:{source_epsg} is not a known coordinate reference"
            ))
        })?;
        let target_def = proj_string(target_epsg).ok_or_else(|| {
            StageError::IndexBuild(format!(
                "EPSG:{target_epsg} is not a known coordinate reference"
            ))
        })?;

        let source = Proj::from_proj_string(source_def).map_err(|e| {
            StageError::IndexBuild(format!(
                "invalid source projection EPSG:{source_epsg}: {e:?}"
            ))
        })?;
        let target = Proj::from_proj_string(target_def).map_err(|e| {
            StageError::IndexBuild(format!(
                "invalid target projection EPSG:{target_epsg}: {e:?}"
            ))
        })?;

        Ok(Self {
            source,
            target,
            source_geographic: is_geographic(source_epsg),
            target_geographic: is_geographic(target_epsg),
        })
    }

    /// Transform a single (x, y) point.
    pub fn apply(&self, x: f64, y: f64) -> StageResult<(f64, f64)> {
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.source, &self.target, &mut point).map_err(|e| {
            StageError::IndexBuild(format!("coordinate transform failed: {e:?}"))
        })?;

        if self.target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Transform a ring of points in place.
    pub fn apply_ring(&self, ring: &mut [(f64, f64)]) -> StageResult<()> {
        for point in ring.iter_mut() {
            *point = self.apply(point.0, point.1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-5;

    #[test]
    fn test_identity_same_frame() {
        let transform = FrameTransform::new(4326, 4326).unwrap();
        let (x, y) = transform.apply(15.0, 52.0).unwrap();
        assert!((x - 15.0).abs() < EPS);
        assert!((y - 52.0).abs() < EPS);
    }

    #[test]
    fn test_utm_roundtrip() {
        let forward = FrameTransform::new(4326, 32633).unwrap();
        let (e, n) = forward.apply(15.0, 52.0).unwrap();
        // zone 33N, near the central meridian
        assert!(e > 400_000.0 && e < 600_000.0, "easting {e}");
        assert!(n > 5_000_000.0 && n < 6_000_000.0, "northing {n}");

        let back = FrameTransform::new(32633, 4326).unwrap();
        let (lon, lat) = back.apply(e, n).unwrap();
        assert!((lon - 15.0).abs() < EPS, "lon {lon}");
        assert!((lat - 52.0).abs() < EPS, "lat {lat}");
    }

    #[test]
    fn test_southern_utm_zone_known() {
        // zone 51S covers the Sentinel-2 T51 tiles
        assert!(proj_string(32751).is_some());
        assert!(!is_geographic(32751));
        assert!(is_geographic(4326));
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        let result = FrameTransform::new(4326, 65000);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_ring() {
        let transform = FrameTransform::new(32633, 4326).unwrap();
        let mut ring = [
            (400_000.0, 5_700_000.0),
            (500_000.0, 5_700_000.0),
            (500_000.0, 5_800_000.0),
            (400_000.0, 5_800_000.0),
            (400_000.0, 5_700_000.0),
        ];
        transform.apply_ring(&mut ring).unwrap();
        for (lon, lat) in ring {
            assert!((12.0..18.0).contains(&lon), "lon {lon}");
            assert!((50.0..54.0).contains(&lat), "lat {lat}");
        }
    }
}
