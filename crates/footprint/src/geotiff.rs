//! GeoTIFF footprint extraction from raster granule bytes.
//!
//! Only header tags are decoded, never pixel data: the extent comes from
//! ModelTiepoint + ModelPixelScale and the native frame from the
//! GeoKeyDirectory CRS key.

use std::io::Cursor;

use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::trace;

use aoi_common::{BoundingBox, StageError, StageResult};

// GeoTIFF tag ids (not named in the tiff crate)
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey ids carrying the CRS code
const GEOGRAPHIC_TYPE_GEO_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u32 = 3072;

/// Extent and native frame read from a granule's GeoTIFF tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterExtent {
    pub bounds: BoundingBox,
    pub epsg: u16,
}

/// Read the bounding box and native EPSG code from GeoTIFF bytes.
pub fn read_extent(path: &str, data: &[u8]) -> StageResult<RasterExtent> {
    let mut decoder = Decoder::new(Cursor::new(data))
        .map_err(|e| StageError::IndexBuild(format!("{path}: not a readable TIFF: {e}")))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| StageError::IndexBuild(format!("{path}: missing image dimensions: {e}")))?;

    let scale = tag_f64s(&mut decoder, MODEL_PIXEL_SCALE)
        .ok_or_else(|| missing_tag(path, "ModelPixelScale"))?;
    let tiepoint = tag_f64s(&mut decoder, MODEL_TIEPOINT)
        .ok_or_else(|| missing_tag(path, "ModelTiepoint"))?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(StageError::IndexBuild(format!(
            "{path}: malformed georeferencing tags"
        )));
    }

    // Tiepoint (i, j, k, x, y, z) pins pixel (0, 0) to world (x, y); the
    // extent follows from the pixel scale and the image dimensions.
    let origin_x = tiepoint[3];
    let origin_y = tiepoint[4];
    let bounds = BoundingBox::new(
        origin_x,
        origin_y - scale[1] * f64::from(height),
        origin_x + scale[0] * f64::from(width),
        origin_y,
    );

    let keys = tag_u32s(&mut decoder, GEO_KEY_DIRECTORY)
        .ok_or_else(|| missing_tag(path, "GeoKeyDirectory"))?;
    let epsg = crs_code(path, &keys)?;

    trace!(path, epsg, "read raster extent");
    Ok(RasterExtent { bounds, epsg })
}

fn missing_tag(path: &str, tag: &str) -> StageError {
    StageError::IndexBuild(format!("{path}: no {tag} tag, footprint is unreadable"))
}

fn tag_f64s(decoder: &mut Decoder<Cursor<&[u8]>>, tag: u16) -> Option<Vec<f64>> {
    decoder
        .find_tag(Tag::Unknown(tag))
        .ok()
        .flatten()
        .and_then(|value| value.into_f64_vec().ok())
}

fn tag_u32s(decoder: &mut Decoder<Cursor<&[u8]>>, tag: u16) -> Option<Vec<u32>> {
    decoder
        .find_tag(Tag::Unknown(tag))
        .ok()
        .flatten()
        .and_then(|value| value.into_u32_vec().ok())
}

/// The CRS code from a GeoKeyDirectory: entries are 4-value records after
/// the 4-value header, and the code sits in either the geographic or the
/// projected CRS key with an inline value.
fn crs_code(path: &str, keys: &[u32]) -> StageResult<u16> {
    for entry in keys.get(4..).unwrap_or(&[]).chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location == 0
            && (key == GEOGRAPHIC_TYPE_GEO_KEY || key == PROJECTED_CS_TYPE_GEO_KEY)
        {
            return u16::try_from(value).map_err(|_| {
                StageError::IndexBuild(format!("{path}: CRS code {value} out of range"))
            });
        }
    }
    Err(StageError::IndexBuild(format!(
        "{path}: no CRS code in GeoKeyDirectory"
    )))
}
