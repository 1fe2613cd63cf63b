use chrono::Duration;
use gridprep_parser::{timestamp_column, TIMESTAMP};
use polars::prelude::*;

use crate::error::Result;
use crate::grid::{bounds, step_micros, timestamp_values};

#[derive(Debug, Default, Clone, Copy)]
struct BucketStats {
    count: usize,
    sum: f64,
}

impl BucketStats {
    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Averages every value column into fixed buckets aligned to multiples of `bucket` since the
/// epoch (midnight-aligned for any bucket that divides a day).
///
/// Nulls are skipped; a bucket with no non-null input is null. Buckets run contiguously from the
/// first to the last populated one, so the output is itself a regular grid at `bucket`.
pub fn resample_mean(df: &DataFrame, bucket: Duration) -> Result<DataFrame> {
    let period = step_micros(bucket)?;
    let timestamps = timestamp_values(df)?;

    let Some((min, max)) = bounds(&timestamps) else {
        return Ok(df.clear());
    };

    let first = floor_bucket(min, period);
    let last = floor_bucket(max, period);
    let bucket_count = ((last - first) / period + 1) as usize;
    let slots: Vec<Option<usize>> = timestamps
        .iter()
        .map(|ts| ts.map(|ts| ((floor_bucket(ts, period) - first) / period) as usize))
        .collect();

    let keys: Vec<i64> = (0..bucket_count as i64).map(|i| first + i * period).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    columns.push(timestamp_column(keys)?);

    for column in df.get_columns() {
        if column.name().as_str() == TIMESTAMP {
            continue;
        }
        let values = column.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let mut stats = vec![BucketStats::default(); bucket_count];
        for (idx, slot) in slots.iter().enumerate() {
            if let (Some(slot), Some(value)) = (slot, values.get(idx)) {
                stats[*slot].count += 1;
                stats[*slot].sum += value;
            }
        }

        let means: Vec<Option<f64>> = stats.iter().map(BucketStats::mean).collect();
        columns.push(Series::new(column.name().clone(), means).into());
    }

    Ok(DataFrame::new(columns)?)
}

fn floor_bucket(ts: i64, period: i64) -> i64 {
    ts - ts.rem_euclid(period)
}
