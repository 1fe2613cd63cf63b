use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{timestamp_column, PowerColumn};
use crate::registry::MeasurementParser;

use super::{column_index, csv_reader, field, parse_optional_f64, parse_timestamp, read_headers};

/// Reads the per-sensor power export (`Time, Pplus_kW_, Pminus_kW_, Qplus_kvar_, Qminus_kvar_`)
/// into a table keyed by `timestamp` with canonical `P_plus/P_minus/Q_plus/Q_minus` columns.
///
/// Extra columns are ignored. Rows are returned in timestamp order; duplicate timestamps are
/// kept and left for the grid aligner to reject.
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerParser;

impl PowerParser {
    const NAME: &'static str = "POWER";
    const TIME_COLUMN: &'static str = "Time";
}

impl MeasurementParser for PowerParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<DataFrame, ParserError> {
        let mut reader = csv_reader(content);
        let headers = read_headers(Self::NAME, &mut reader)?;

        let time_idx = column_index(Self::NAME, &headers, Self::TIME_COLUMN)?;
        let mut value_idx = [0usize; 4];
        for (slot, column) in value_idx.iter_mut().zip(PowerColumn::ALL) {
            *slot = column_index(Self::NAME, &headers, column.source_name())?;
        }

        let mut rows: Vec<(i64, [Option<f64>; 4])> = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|source| ParserError::Csv {
                parser: Self::NAME,
                source,
            })?;
            let line_index = row_idx + 2; // header is line 1

            let timestamp = parse_timestamp(Self::NAME, field(&record, time_idx), line_index)?;
            let mut values = [None; 4];
            for ((value, idx), column) in values.iter_mut().zip(value_idx).zip(PowerColumn::ALL) {
                *value = parse_optional_f64(
                    Self::NAME,
                    field(&record, idx),
                    line_index,
                    column.source_name(),
                )?;
            }
            rows.push((timestamp, values));
        }

        if rows.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        rows.sort_by_key(|(timestamp, _)| *timestamp);
        build_power_frame(rows).map_err(|source| ParserError::Polars {
            parser: Self::NAME,
            source,
        })
    }
}

fn build_power_frame(rows: Vec<(i64, [Option<f64>; 4])>) -> PolarsResult<DataFrame> {
    let timestamps: Vec<i64> = rows.iter().map(|(ts, _)| *ts).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(PowerColumn::ALL.len() + 1);
    columns.push(timestamp_column(timestamps)?);

    for (position, column) in PowerColumn::ALL.iter().enumerate() {
        let values: Vec<Option<f64>> = rows.iter().map(|(_, vals)| vals[position]).collect();
        columns.push(Series::new(column.canonical_name().into(), values).into());
    }

    DataFrame::new(columns)
}
