//! Spatial index construction for granule batches.

use std::path::PathBuf;

use bytes::Bytes;
use geo::{LineString, Polygon};
use tracing::debug;

use aoi_common::StageResult;

use crate::geotiff;
use crate::hdf::{self, CoordinateArrayReader};
use crate::projection::{FrameTransform, CANONICAL_EPSG};

/// One granule footprint in the canonical frame.
#[derive(Debug, Clone)]
pub struct SpatialIndexRecord {
    /// Footprint polygon in EPSG:4326.
    pub geometry: Polygon<f64>,
    /// The original input path token, never re-derived.
    pub path: String,
}

/// In-memory index over one (tier, dataset) granule batch. Rebuilt per
/// batch and discarded after filtering; never cached across calls.
pub type SpatialIndex = Vec<SpatialIndexRecord>;

/// Build an index from raster granules.
///
/// The native frame is taken from the first granule and assumed uniform
/// across the batch; when it is not the canonical frame every rectangle is
/// reprojected in one batch pass, with the transform built once. Any
/// unreadable granule fails the whole batch.
pub fn build_raster_index(granules: &[(String, Bytes)]) -> StageResult<SpatialIndex> {
    let mut extents = Vec::with_capacity(granules.len());
    for (path, data) in granules {
        extents.push(geotiff::read_extent(path, data)?);
    }

    let batch_epsg = extents.first().map(|e| e.epsg).unwrap_or(CANONICAL_EPSG);
    let mut rings: Vec<[(f64, f64); 5]> =
        extents.iter().map(|e| e.bounds.corner_ring()).collect();

    if batch_epsg != CANONICAL_EPSG {
        let transform = FrameTransform::new(batch_epsg, CANONICAL_EPSG)?;
        for ring in &mut rings {
            transform.apply_ring(ring)?;
        }
    }

    let index: SpatialIndex = granules
        .iter()
        .zip(rings)
        .map(|((path, _), ring)| SpatialIndexRecord {
            geometry: Polygon::new(LineString::from(ring.to_vec()), vec![]),
            path: path.clone(),
        })
        .collect();

    debug_assert_eq!(index.len(), granules.len());
    debug!(count = index.len(), epsg = batch_epsg, "built raster index");
    Ok(index)
}

/// Build an index from HDF granules via their bounding-polygon arrays.
///
/// Takes (path token, readable local file) pairs so remote granules can be
/// staged to scratch space first; the record keeps the path token.
pub fn build_hdf_index(
    granules: &[(String, PathBuf)],
    reader: &dyn CoordinateArrayReader,
) -> StageResult<SpatialIndex> {
    let mut index = Vec::with_capacity(granules.len());
    for (path, local) in granules {
        let (lats, lons) = reader.polygon_arrays(local)?;
        index.push(SpatialIndexRecord {
            geometry: hdf::ring_from_arrays(path, &lats, &lons)?,
            path: path.clone(),
        });
    }

    debug_assert_eq!(index.len(), granules.len());
    debug!(count = index.len(), "built hdf index");
    Ok(index)
}
