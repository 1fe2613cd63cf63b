use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::aggregate::SkippedSensor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Whole seconds print without a fraction; sub-second keys keep theirs.
const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Row count of one written table.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub rows: usize,
}

/// Machine readable record of a batch run, written next to the tables it describes.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub generated_at: String,
    pub command: &'a str,
    pub config: &'a PipelineConfig,
    pub processed: &'a [u32],
    pub skipped: &'a [SkippedSensor],
    pub outputs: &'a [WrittenOutput],
}

impl<'a> RunSummary<'a> {
    pub fn new(
        command: &'a str,
        config: &'a PipelineConfig,
        processed: &'a [u32],
        skipped: &'a [SkippedSensor],
        outputs: &'a [WrittenOutput],
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            command,
            config,
            processed,
            skipped,
            outputs,
        }
    }
}

/// Writes `df` as CSV or Parquet depending on the extension of `path`.
///
/// The table is written to a hidden sibling first and renamed into place, so a failed write
/// never leaves a truncated file under the final name.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<WrittenOutput> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staged_path(path);

    let written = File::create(&staged)
        .map_err(PipelineError::from)
        .and_then(|mut file| match extension.as_str() {
            "csv" => CsvWriter::new(&mut file)
                .include_header(true)
                .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
                .finish(df)
                .map_err(PipelineError::from),
            "parquet" => ParquetWriter::new(&mut file)
                .finish(df)
                .map(|_| ())
                .map_err(PipelineError::from),
            other => Err(PipelineError::Config(format!(
                "unsupported output extension '{other}' for {}; use .csv or .parquet",
                path.display()
            ))),
        });

    if let Err(err) = written {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    fs::rename(&staged, path)?;

    info!(path = %path.display(), rows = df.height(), "wrote output table");
    Ok(WrittenOutput {
        path: path.to_path_buf(),
        rows: df.height(),
    })
}

pub fn write_run_summary(summary: &RunSummary<'_>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(summary)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn staged_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprep_parser::timestamp_column;
    use polars::df;

    #[test]
    fn csv_uses_plain_datetime_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut df = df!["P_plus" => [Some(1.5), None]].unwrap();
        df.insert_column(
            0,
            timestamp_column(vec![0, 15 * 60_000_000]).unwrap(),
        )
        .unwrap();

        let written = write_frame(&mut df, &path).unwrap();
        assert_eq!(written.rows, 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,P_plus");
        assert_eq!(lines[1], "1970-01-01 00:00:00,1.5");
        assert_eq!(lines[2], "1970-01-01 00:15:00,");
        assert!(!staged_path(&path).exists());
    }

    #[test]
    fn csv_keeps_sub_second_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!["V_1" => [Some(1.0)]].unwrap();
        df.insert_column(0, timestamp_column(vec![500_000]).unwrap())
            .unwrap();

        write_frame(&mut df, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.starts_with("1970-01-01 00:00:00.5"), "got {row}");
        assert!(row.ends_with(",1.0"), "got {row}");
    }

    #[test]
    fn unknown_extension_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut df = df!["a" => [1i64]].unwrap();

        let err = write_frame(&mut df, &path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!path.exists());
        assert!(!staged_path(&path).exists());
    }

    #[test]
    fn parquet_round_trips_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut df = df!["a" => [1i64, 2, 3]].unwrap();
        write_frame(&mut df, &path).unwrap();

        let file = File::open(&path).unwrap();
        let back = ParquetReader::new(file).finish().unwrap();
        assert_eq!(back.height(), 3);
    }
}
