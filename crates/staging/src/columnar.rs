//! Post-copy columnar filtering by acquisition date.

use std::fs::File;
use std::path::Path;

use arrow::array::{RecordBatch, StringArray};
use arrow::compute::filter_record_batch;
use arrow::compute::kernels::cmp::eq;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use aoi_common::{StageError, StageResult};

/// Column holding the acquisition date, rendered `%Y-%m-%d`.
pub const DATE_COLUMN: &str = "date";

/// Rewrite a parquet file in place, keeping only rows whose date column
/// equals the target date. Returns the number of rows kept.
///
/// Every failure is a PostProcess error so the caller can keep the
/// unfiltered copy and downgrade to a warning.
pub fn filter_by_date(path: &Path, date: NaiveDate) -> StageResult<usize> {
    let target = date.format("%Y-%m-%d").to_string();

    let file = File::open(path).map_err(|e| post_process(path, format!("open: {e}")))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| post_process(path, format!("parquet open: {e}")))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| post_process(path, format!("parquet read: {e}")))?;

    let scalar = StringArray::new_scalar(target.as_str());
    let mut filtered: Vec<RecordBatch> = Vec::new();
    let mut kept = 0usize;

    for batch in reader {
        let batch = batch.map_err(|e| post_process(path, format!("parquet decode: {e}")))?;
        let column = batch
            .column_by_name(DATE_COLUMN)
            .ok_or_else(|| post_process(path, format!("missing '{DATE_COLUMN}' column")))?;
        let column = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| post_process(path, format!("'{DATE_COLUMN}' column is not utf8")))?;

        let mask =
            eq(column, &scalar).map_err(|e| post_process(path, format!("date compare: {e}")))?;
        let subset = filter_record_batch(&batch, &mask)
            .map_err(|e| post_process(path, format!("row filter: {e}")))?;

        kept += subset.num_rows();
        filtered.push(subset);
    }

    // All batches are in memory; only now truncate and rewrite the file.
    let out = File::create(path).map_err(|e| post_process(path, format!("rewrite: {e}")))?;
    let mut writer = ArrowWriter::try_new(out, schema, None)
        .map_err(|e| post_process(path, format!("parquet write: {e}")))?;
    for batch in &filtered {
        writer
            .write(batch)
            .map_err(|e| post_process(path, format!("parquet write: {e}")))?;
    }
    writer
        .close()
        .map_err(|e| post_process(path, format!("parquet close: {e}")))?;

    debug!(path = %path.display(), kept, "filtered columnar rows");
    Ok(kept)
}

fn post_process(path: &Path, message: String) -> StageError {
    StageError::PostProcess {
        path: path.display().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::write_dated_parquet;

    fn target_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn test_keeps_only_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.parquet");
        write_dated_parquet(
            &path,
            &[
                (1, "alpha", "2025-04-01"),
                (2, "beta", "2020-04-05"),
                (3, "gamma", "2025-04-01"),
                (4, "delta", "2020-09-25"),
            ],
        );

        let kept = filter_by_date(&path, target_date()).unwrap();
        assert_eq!(kept, 2);

        // the rewritten file only holds the matching rows
        let reread = filter_by_date(&path, target_date()).unwrap();
        assert_eq!(reread, 2);
    }

    #[test]
    fn test_no_matching_rows_leaves_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.parquet");
        write_dated_parquet(&path, &[(1, "alpha", "2020-01-01")]);

        let kept = filter_by_date(&path, target_date()).unwrap();
        assert_eq!(kept, 0);
    }

    #[test]
    fn test_missing_date_column_is_a_post_process_error() {
        use arrow::array::Int64Array;
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_date.parquet");

        let schema = Arc::new(Schema::new(vec![Field::new(
            "id",
            DataType::Int64,
            false,
        )]));
        let batch = arrow::record_batch::RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![1, 2]))],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let result = filter_by_date(&path, target_date());
        assert!(matches!(result, Err(StageError::PostProcess { .. })));
    }

    #[test]
    fn test_unreadable_file_is_a_post_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.parquet");
        std::fs::write(&path, b"not parquet").unwrap();

        let result = filter_by_date(&path, target_date());
        assert!(matches!(result, Err(StageError::PostProcess { .. })));
    }
}
