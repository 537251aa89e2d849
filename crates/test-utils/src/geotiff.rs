//! Synthetic GeoTIFF tile writer.
//!
//! Writes tiny single-band tiles carrying real georeferencing tags
//! (ModelPixelScale, ModelTiepoint, GeoKeyDirectory) so footprint
//! extraction can run against them exactly as it would against archive
//! granules.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tiff::encoder::colortype::Gray8;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

use aoi_common::BoundingBox;

// GeoTIFF tag ids (not named in the tiff crate)
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

const TILE_SIZE: u32 = 16;

/// Write a synthetic tile covering `bounds` in the given frame.
///
/// Panics on failure; fixtures have no error path worth handling.
pub fn write_tile(path: &Path, bounds: BoundingBox, epsg: u16) {
    let file = File::create(path).expect("create tile file");
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).expect("tiff encoder");

    let mut image = encoder
        .new_image::<Gray8>(TILE_SIZE, TILE_SIZE)
        .expect("new tiff image");

    let scale = [
        bounds.width() / f64::from(TILE_SIZE),
        bounds.height() / f64::from(TILE_SIZE),
        0.0,
    ];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .expect("pixel scale tag");

    // Tiepoint pins pixel (0, 0) to the top-left world corner.
    let tiepoint = [0.0, 0.0, 0.0, bounds.min_x, bounds.max_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .expect("tiepoint tag");

    let keys = geokey_directory(epsg);
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), keys.as_slice())
        .expect("geokey directory tag");

    let pixels = vec![1u8; (TILE_SIZE * TILE_SIZE) as usize];
    image.write_data(&pixels).expect("tile pixel data");
}

/// GeoKeyDirectory: a 4-value header then 4-value key entries, with the
/// CRS code under the geographic or projected key as appropriate.
fn geokey_directory(epsg: u16) -> Vec<u16> {
    let geographic = epsg == 4326;
    let mut keys = vec![1, 1, 0, 3];
    // GTModelTypeGeoKey: 2 = geographic, 1 = projected
    keys.extend_from_slice(&[1024, 0, 1, if geographic { 2 } else { 1 }]);
    // GTRasterTypeGeoKey: 1 = pixel-is-area
    keys.extend_from_slice(&[1025, 0, 1, 1]);
    if geographic {
        keys.extend_from_slice(&[2048, 0, 1, epsg]);
    } else {
        keys.extend_from_slice(&[3072, 0, 1, epsg]);
    }
    keys
}
