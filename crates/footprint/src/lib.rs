//! Granule footprint extraction and AOI intersection filtering.
//!
//! A spatial index is one polygon per granule, normalized to EPSG:4326:
//! raster footprints come from GeoTIFF extent tags (reprojected batch-wise
//! when the native frame is projected), HDF footprints from the
//! bounding-polygon coordinate arrays inside each granule. The AOI is
//! unioned once per run and intersected against whole indexes.

pub mod aoi;
pub mod geotiff;
pub mod hdf;
pub mod index;
pub mod projection;

pub use aoi::{AoiGeometry, FilterOutcome};
pub use geotiff::RasterExtent;
pub use hdf::CoordinateArrayReader;
#[cfg(feature = "hdf-native")]
pub use hdf::NetcdfArrayReader;
pub use index::{build_hdf_index, build_raster_index, SpatialIndex, SpatialIndexRecord};
