//! Dataset identifiers and declared file descriptors.
//!
//! Raster and HDF datasets come from closed enumerations so an
//! unrecognized identifier fails at directive parse time, before any
//! filesystem access. Declared files carry their own validation rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StageError, StageResult};

/// Vector container formats supported by the subsetter, by extension.
pub const VECTOR_EXTENSIONS: [&str; 2] = ["geojson", "json"];

/// Columnar container format supported by the post-copy filter.
pub const COLUMNAR_EXTENSION: &str = "parquet";

/// Raster dataset families with recognized archive naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterDataset {
    #[serde(rename = "sentinel-2")]
    Sentinel2,
    #[serde(rename = "landsat")]
    Landsat,
}

impl RasterDataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            RasterDataset::Sentinel2 => "sentinel-2",
            RasterDataset::Landsat => "landsat",
        }
    }

    /// Recognized granule extension for this family.
    pub fn extension(&self) -> &'static str {
        "tif"
    }

    /// Suffix of the companion metadata file shipped next to each granule,
    /// if the family has one.
    pub fn sidecar_extension(&self) -> Option<&'static str> {
        match self {
            RasterDataset::Landsat => Some("json"),
            RasterDataset::Sentinel2 => None,
        }
    }
}

impl fmt::Display for RasterDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HDF dataset families with recognized archive naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdfDataset {
    #[serde(rename = "icesat-2")]
    Icesat2,
}

impl HdfDataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            HdfDataset::Icesat2 => "icesat-2",
        }
    }

    /// Recognized granule extension for this family.
    pub fn extension(&self) -> &'static str {
        "h5"
    }
}

impl fmt::Display for HdfDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared vector file: name plus optional layer or query selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFile {
    pub name: String,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl VectorFile {
    /// Reject descriptors outside the supported container set.
    pub fn validate(&self) -> StageResult<()> {
        let extension = file_extension(&self.name);
        if !VECTOR_EXTENSIONS.contains(&extension) {
            return Err(StageError::Configuration(format!(
                "unsupported vector container '{}': expected one of {:?}",
                self.name, VECTOR_EXTENSIONS
            )));
        }
        if self.layer.is_some() && self.query.is_some() {
            return Err(StageError::Configuration(format!(
                "vector file '{}' declares both layer and query",
                self.name
            )));
        }
        if self.layer.is_some() {
            return Err(StageError::Configuration(format!(
                "vector file '{}': layer selection is not supported for GeoJSON sources",
                self.name
            )));
        }
        if self.query.is_some() {
            return Err(StageError::Configuration(format!(
                "vector file '{}': queries are not supported for GeoJSON sources",
                self.name
            )));
        }
        Ok(())
    }
}

/// Declared tabular file (CSV and the like); copied verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularFile {
    pub name: String,
}

/// Declared columnar file; copied, then row-filtered by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnarFile {
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
}

impl ColumnarFile {
    /// Reject descriptors outside the supported container set.
    pub fn validate(&self) -> StageResult<()> {
        if file_extension(&self.name) != COLUMNAR_EXTENSION {
            return Err(StageError::Configuration(format!(
                "unsupported columnar container '{}': expected .{}",
                self.name, COLUMNAR_EXTENSION
            )));
        }
        Ok(())
    }
}

/// Extension of a file name, without the dot; empty when absent.
pub fn file_extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert_eq!(RasterDataset::Sentinel2.as_str(), "sentinel-2");
        assert_eq!(RasterDataset::Landsat.as_str(), "landsat");
        assert_eq!(HdfDataset::Icesat2.as_str(), "icesat-2");
    }

    #[test]
    fn test_landsat_ships_a_sidecar() {
        assert_eq!(RasterDataset::Landsat.sidecar_extension(), Some("json"));
        assert_eq!(RasterDataset::Sentinel2.sidecar_extension(), None);
    }

    #[test]
    fn test_vector_extension_closed_set() {
        let good = VectorFile {
            name: "boundaries.geojson".into(),
            layer: None,
            query: None,
        };
        assert!(good.validate().is_ok());

        let bad = VectorFile {
            name: "boundaries.gpkg".into(),
            layer: None,
            query: None,
        };
        assert!(matches!(
            bad.validate(),
            Err(StageError::Configuration(_))
        ));
    }

    #[test]
    fn test_vector_layer_and_query_are_rejected() {
        let with_layer = VectorFile {
            name: "a.geojson".into(),
            layer: Some("admin".into()),
            query: None,
        };
        assert!(with_layer.validate().is_err());

        let with_both = VectorFile {
            name: "a.geojson".into(),
            layer: Some("admin".into()),
            query: Some("pop > 1".into()),
        };
        assert!(with_both.validate().is_err());
    }

    #[test]
    fn test_columnar_extension() {
        let good = ColumnarFile {
            name: "observations.parquet".into(),
            query: None,
        };
        assert!(good.validate().is_ok());

        let bad = ColumnarFile {
            name: "observations.csv".into(),
            query: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a.b.parquet"), "parquet");
        assert_eq!(file_extension("noext"), "");
    }
}
