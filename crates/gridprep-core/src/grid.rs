use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime};
use gridprep_parser::{timestamp_column, TIMESTAMP};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Reindexes `df` onto the complete sequence `min..=max` of its timestamps at `step`.
///
/// Grid points with no matching row become all-null rows; rows whose timestamp does not fall
/// on the grid are dropped. Every non-timestamp column is carried over with its dtype.
pub fn align_to_grid(df: &DataFrame, step: Duration) -> Result<DataFrame> {
    let step = step_micros(step)?;
    let timestamps = timestamp_values(df)?;

    let Some((min, max)) = bounds(&timestamps) else {
        return Ok(df.clear());
    };

    let positions = unique_positions(&timestamps)?;
    let grid: Vec<i64> = (0..=(max - min) / step).map(|i| min + i * step).collect();
    let rows: Vec<Option<usize>> = grid.iter().map(|ts| positions.get(ts).copied()).collect();

    reindex(df, grid, &rows)
}

/// True when the timestamps are non-null and advance by exactly `step`.
pub fn grid_is_regular(df: &DataFrame, step: Duration) -> Result<bool> {
    let step = step_micros(step)?;
    let timestamps = timestamp_values(df)?;
    if timestamps.iter().any(Option::is_none) {
        return Ok(false);
    }
    Ok(timestamps
        .windows(2)
        .all(|pair| matches!(pair, [Some(a), Some(b)] if b - a == step)))
}

pub(crate) fn step_micros(step: Duration) -> Result<i64> {
    match step.num_microseconds() {
        Some(micros) if micros > 0 => Ok(micros),
        _ => Err(PipelineError::Config(format!(
            "time step must be a positive duration, got {step}"
        ))),
    }
}

/// Reads the `timestamp` column as microseconds, casting other datetime units.
pub(crate) fn timestamp_values(df: &DataFrame) -> Result<Vec<Option<i64>>> {
    let column = df
        .column(TIMESTAMP)?
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let ca = column.datetime()?;
    Ok((0..column.len()).map(|idx| ca.get(idx)).collect())
}

pub(crate) fn bounds(timestamps: &[Option<i64>]) -> Option<(i64, i64)> {
    let mut present = timestamps.iter().flatten().copied();
    let first = present.next()?;
    Some(present.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
}

/// Row position of each timestamp. A key may appear only once.
pub(crate) fn unique_positions(timestamps: &[Option<i64>]) -> Result<HashMap<i64, usize>> {
    let mut positions = HashMap::with_capacity(timestamps.len());
    let mut duplicates: Vec<i64> = Vec::new();

    for (idx, ts) in timestamps.iter().enumerate() {
        if let Some(ts) = ts {
            if positions.insert(*ts, idx).is_some() {
                duplicates.push(*ts);
            }
        }
    }

    match duplicates.iter().min() {
        None => Ok(positions),
        Some(first) => Err(PipelineError::DuplicateTimestamp {
            count: duplicates.len(),
            first: naive_from_micros(*first),
        }),
    }
}

/// Builds a new frame keyed by `keys`, pulling row `rows[i]` of `df` (or nulls) for key `i`.
pub(crate) fn reindex(df: &DataFrame, keys: Vec<i64>, rows: &[Option<usize>]) -> Result<DataFrame> {
    let indices = IdxCa::from_iter_options(
        "row".into(),
        rows.iter().map(|row| row.map(|idx| idx as IdxSize)),
    );

    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    columns.push(timestamp_column(keys)?);
    for column in df.get_columns() {
        if column.name().as_str() == TIMESTAMP {
            continue;
        }
        let taken = column.as_materialized_series().take(&indices)?;
        columns.push(taken.into());
    }

    Ok(DataFrame::new(columns)?)
}

pub(crate) fn naive_from_micros(value: i64) -> NaiveDateTime {
    DateTime::from_timestamp_micros(value)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}
