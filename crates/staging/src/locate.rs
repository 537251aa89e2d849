//! Granule discovery by filename date grammar.
//!
//! Each dataset family encodes its acquisition date differently; the
//! grammars here are compatibility surface for existing archives and must
//! not drift. No match anywhere is an empty result, not an error.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use aoi_common::{HdfDataset, RasterDataset, StageResult};

use crate::store::DataStore;

/// One discovered source file and the acquisition date its name encodes.
#[derive(Debug, Clone)]
pub struct Granule {
    pub path: String,
    pub date: NaiveDate,
}

// 8-digit date followed by a 6-digit time token
fn sentinel2_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"S2.\w+_(\d{8})T\d{6}_").expect("sentinel-2 date pattern"))
}

// 6-digit path/row token, then the 8-digit date, then the level suffix
fn landsat_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"LC.._L2SP_\d{6}_(\d{8})_").expect("landsat date pattern"))
}

// first 8-digit run anywhere in the name
fn date_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{8}").expect("date token pattern"))
}

/// Acquisition date token of a raster granule name, per family grammar.
fn raster_date_token(name: &str) -> Option<&str> {
    if name.contains("S2") {
        sentinel2_pattern()
            .captures(name)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    } else if name.contains("LC") {
        landsat_pattern()
            .captures(name)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    } else {
        None
    }
}

/// Date token of an HDF granule name: the first 8-digit run.
fn hdf_date_token(name: &str) -> Option<&str> {
    date_run_pattern().find(name).map(|m| m.as_str())
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn has_extension(name: &str, extension: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext == extension)
        .unwrap_or(false)
}

/// List raster granules under `<tier root>/<dataset>` whose name encodes
/// the target date.
///
/// A missing dataset directory surfaces as a LookupMiss for the caller's
/// policy to judge; an empty match set is a normal result.
pub async fn rasters_for_date(
    store: &dyn DataStore,
    tier_root: &str,
    dataset: RasterDataset,
    date: NaiveDate,
) -> StageResult<Vec<Granule>> {
    let prefix = format!("{tier_root}/{dataset}");
    let keys = store.list(&prefix).await?;
    let target = date.format("%Y%m%d").to_string();

    let granules: Vec<Granule> = keys
        .into_iter()
        .filter(|key| has_extension(file_name(key), dataset.extension()))
        .filter(|key| raster_date_token(file_name(key)) == Some(target.as_str()))
        .map(|path| Granule { path, date })
        .collect();

    debug!(prefix = %prefix, count = granules.len(), "matched raster granules");
    Ok(granules)
}

/// List HDF granules under `<tier root>/<dataset>` whose name encodes the
/// target date.
pub async fn hdf_for_date(
    store: &dyn DataStore,
    tier_root: &str,
    dataset: HdfDataset,
    date: NaiveDate,
) -> StageResult<Vec<Granule>> {
    let prefix = format!("{tier_root}/{dataset}");
    let keys = store.list(&prefix).await?;
    let target = date.format("%Y%m%d").to_string();

    let granules: Vec<Granule> = keys
        .into_iter()
        .filter(|key| has_extension(file_name(key), dataset.extension()))
        .filter(|key| hdf_date_token(file_name(key)) == Some(target.as_str()))
        .map(|path| Granule { path, date })
        .collect();

    debug!(prefix = %prefix, count = granules.len(), "matched hdf granules");
    Ok(granules)
}
