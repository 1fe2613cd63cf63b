use std::collections::BTreeMap;

use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{timestamp_column, Phase};
use crate::registry::MeasurementParser;

use super::{
    column_index, csv_reader, field, optional_column_index, parse_optional_f64, parse_timestamp,
    read_headers,
};

/// Reads the long-form phase voltage export (`time, serialno, variable, value`) and pivots it
/// to one row per timestamp with `V_1/V_2/V_3` columns.
///
/// A timestamp keeps its row even when some phases were never reported for it; those cells are
/// null. Repeated readings for the same timestamp and phase are averaged.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoltageParser;

impl VoltageParser {
    const NAME: &'static str = "PHASE_VOLTAGE";
    const TIME_COLUMN: &'static str = "time";
    const VARIABLE_COLUMN: &'static str = "variable";
    const VALUE_COLUMN: &'static str = "value";
    const SERIAL_COLUMN: &'static str = "serialno";
}

#[derive(Debug, Default)]
struct PhaseAccumulator {
    sums: [f64; 3],
    counts: [u32; 3],
}

impl PhaseAccumulator {
    fn push(&mut self, phase: Phase, value: Option<f64>) {
        if let Some(value) = value {
            self.sums[phase.index()] += value;
            self.counts[phase.index()] += 1;
        }
    }

    fn mean(&self, phase: Phase) -> Option<f64> {
        let count = self.counts[phase.index()];
        (count > 0).then(|| self.sums[phase.index()] / f64::from(count))
    }
}

impl MeasurementParser for VoltageParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<DataFrame, ParserError> {
        let mut reader = csv_reader(content);
        let headers = read_headers(Self::NAME, &mut reader)?;

        let time_idx = column_index(Self::NAME, &headers, Self::TIME_COLUMN)?;
        let variable_idx = column_index(Self::NAME, &headers, Self::VARIABLE_COLUMN)?;
        let value_idx = column_index(Self::NAME, &headers, Self::VALUE_COLUMN)?;
        if optional_column_index(&headers, Self::SERIAL_COLUMN).is_none() {
            tracing::debug!(parser = Self::NAME, "voltage file has no serialno column");
        }

        let mut pivot: BTreeMap<i64, PhaseAccumulator> = BTreeMap::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|source| ParserError::Csv {
                parser: Self::NAME,
                source,
            })?;
            let line_index = row_idx + 2;

            let timestamp = parse_timestamp(Self::NAME, field(&record, time_idx), line_index)?;
            let label = field(&record, variable_idx);
            let phase = Phase::try_from(label).map_err(|_| ParserError::UnknownPhase {
                parser: Self::NAME,
                line_index,
                label: label.trim().to_string(),
            })?;
            let value = parse_optional_f64(
                Self::NAME,
                field(&record, value_idx),
                line_index,
                Self::VALUE_COLUMN,
            )?;

            pivot.entry(timestamp).or_default().push(phase, value);
        }

        if pivot.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        build_voltage_frame(&pivot).map_err(|source| ParserError::Polars {
            parser: Self::NAME,
            source,
        })
    }
}

fn build_voltage_frame(pivot: &BTreeMap<i64, PhaseAccumulator>) -> PolarsResult<DataFrame> {
    let timestamps: Vec<i64> = pivot.keys().copied().collect();
    let mut columns: Vec<Column> = Vec::with_capacity(Phase::ALL.len() + 1);
    columns.push(timestamp_column(timestamps)?);

    for phase in Phase::ALL {
        let values: Vec<Option<f64>> = pivot.values().map(|acc| acc.mean(phase)).collect();
        columns.push(Series::new(phase.canonical_name().into(), values).into());
    }

    DataFrame::new(columns)
}
