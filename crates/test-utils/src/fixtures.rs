//! Archive-style filename generators and small data-file builders.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;

/// Sentinel-2 L2A tile name for an acquisition date and grid cell.
pub fn sentinel_tile_name(date: NaiveDate, row: usize, col: usize) -> String {
    let token = date.format("%Y%m%d");
    format!("S2A_MSIL2A_{token}T015631_R117_T51LWC_{token}T043813_tile{row}{col}.tif")
}

/// Landsat Collection 2 L2SP tile name.
pub fn landsat_tile_name(date: NaiveDate, row: usize, col: usize) -> String {
    format!(
        "LC08_L2SP_120034_{}_02_T1_tile{row}{col}.tif",
        date.format("%Y%m%d")
    )
}

/// ICESat-2 granule name; the date token sits mid-name.
pub fn icesat_granule_name(date: NaiveDate, track: u32) -> String {
    format!(
        "ATL03_{}120000_{track:04}0811_006_01.h5",
        date.format("%Y%m%d")
    )
}

/// A rectangular AOI as a single-feature GeoJSON FeatureCollection.
pub fn aoi_geojson(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        concat!(
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{}},"#,
            r#""geometry":{{"type":"Polygon","coordinates":"#,
            r#"[[[{0},{1}],[{2},{1}],[{2},{3}],[{0},{3}],[{0},{1}]]]}}}}]}}"#
        ),
        min_x, min_y, max_x, max_y
    )
}

/// Write a parquet file of (id, name, date) rows, dates as `YYYY-MM-DD`
/// strings.
pub fn write_dated_parquet(path: &Path, rows: &[(i64, &str, &str)]) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
    ]));

    let ids: Vec<i64> = rows.iter().map(|r| r.0).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.1).collect();
    let dates: Vec<&str> = rows.iter().map(|r| r.2).collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(names)),
            Arc::new(StringArray::from(dates)),
        ],
    )
    .expect("fixture record batch");

    let file = std::fs::File::create(path).expect("create parquet fixture");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("parquet writer");
    writer.write(&batch).expect("write parquet fixture");
    writer.close().expect("close parquet fixture");
}
