//! HDF swath footprints from bounding-polygon coordinate arrays.

use std::path::Path;

use geo::{LineString, Polygon};

use aoi_common::{StageError, StageResult};

/// Group-qualified location of the bounding-polygon latitudes.
pub const LATITUDE_ARRAY: &str = "orbit_info/bounding_polygon_lat1";

/// Group-qualified location of the bounding-polygon longitudes.
pub const LONGITUDE_ARRAY: &str = "orbit_info/bounding_polygon_lon1";

/// Reads the bounding-polygon coordinate arrays out of one granule.
///
/// The indirection keeps index construction testable without HDF files on
/// disk; the production reader lives behind the `hdf-native` feature.
pub trait CoordinateArrayReader: Send + Sync {
    fn polygon_arrays(&self, file: &Path) -> StageResult<(Vec<f64>, Vec<f64>)>;
}

/// Zip latitude/longitude arrays pairwise, in order, into a closed ring.
///
/// The arrays must agree in length; a mismatch fails the whole batch the
/// granule belongs to.
pub fn ring_from_arrays(path: &str, lats: &[f64], lons: &[f64]) -> StageResult<Polygon<f64>> {
    if lats.len() != lons.len() {
        return Err(StageError::IndexBuild(format!(
            "{path}: bounding polygon arrays differ in length ({} latitudes, {} longitudes)",
            lats.len(),
            lons.len()
        )));
    }

    let coords: Vec<(f64, f64)> = lons.iter().zip(lats).map(|(&x, &y)| (x, y)).collect();
    Ok(Polygon::new(LineString::from(coords), vec![]))
}

#[cfg(feature = "hdf-native")]
mod native {
    use std::path::Path;

    use aoi_common::{StageError, StageResult};

    use super::{CoordinateArrayReader, LATITUDE_ARRAY, LONGITUDE_ARRAY};

    /// Reads coordinate arrays through the netcdf library (HDF5-backed).
    pub struct NetcdfArrayReader;

    impl CoordinateArrayReader for NetcdfArrayReader {
        fn polygon_arrays(&self, file: &Path) -> StageResult<(Vec<f64>, Vec<f64>)> {
            let dataset = netcdf::open(file).map_err(|e| {
                StageError::IndexBuild(format!("{}: cannot open: {e}", file.display()))
            })?;
            let lats = read_array(&dataset, file, LATITUDE_ARRAY)?;
            let lons = read_array(&dataset, file, LONGITUDE_ARRAY)?;
            Ok((lats, lons))
        }
    }

    fn read_array(dataset: &netcdf::File, file: &Path, location: &str) -> StageResult<Vec<f64>> {
        let (group_name, variable_name) = location.split_once('/').unwrap_or(("", location));

        let group = dataset
            .group(group_name)
            .map_err(|e| {
                StageError::IndexBuild(format!("{}: reading {location}: {e}", file.display()))
            })?
            .ok_or_else(|| {
                StageError::IndexBuild(format!(
                    "{}: no {group_name} group",
                    file.display()
                ))
            })?;

        let variable = group.variable(variable_name).ok_or_else(|| {
            StageError::IndexBuild(format!("{}: no {location} array", file.display()))
        })?;

        variable.get_values::<f64, _>(..).map_err(|e| {
            StageError::IndexBuild(format!("{}: reading {location}: {e}", file.display()))
        })
    }
}

#[cfg(feature = "hdf-native")]
pub use native::NetcdfArrayReader;
