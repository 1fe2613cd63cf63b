use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use gridprep_parser::TRACKED_COLUMNS;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::SENSOR_ID;

pub const METRIC: &str = "metric";
pub const MISSING_COUNT: &str = "missing_count";
pub const MISSING_PERCENTAGE: &str = "missing_percentage";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissing {
    pub column: &'static str,
    pub missing_count: usize,
    /// `None` when the table has no rows.
    pub missing_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingSummary {
    pub sensor_id: u32,
    pub total_rows: usize,
    pub columns: Vec<ColumnMissing>,
}

/// Counts nulls in each tracked column. A tracked column that is absent from `df` counts as
/// entirely missing.
pub fn summarize_missing(df: &DataFrame, sensor_id: u32) -> MissingSummary {
    let total_rows = df.height();
    let columns = TRACKED_COLUMNS
        .iter()
        .map(|&column| {
            let missing_count = df
                .column(column)
                .map(|values| values.null_count())
                .unwrap_or(total_rows);
            ColumnMissing {
                column,
                missing_count,
                missing_percentage: percentage(missing_count, total_rows),
            }
        })
        .collect();

    MissingSummary {
        sensor_id,
        total_rows,
        columns,
    }
}

fn percentage(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = count as f64 / total as f64 * 100.0;
    // exact halves go to the even digit
    Some((raw * 100.0).round_ties_even() / 100.0)
}

impl MissingSummary {
    /// Two rows, `missing_count` then `missing_percentage`, keyed by `sensor_id` and `metric`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = vec![
            Series::new(SENSOR_ID.into(), vec![self.sensor_id; 2]).into(),
            Series::new(METRIC.into(), [MISSING_COUNT, MISSING_PERCENTAGE]).into(),
        ];
        for entry in &self.columns {
            let values = [Some(entry.missing_count as f64), entry.missing_percentage];
            columns.push(Series::new(entry.column.into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnMissing> {
        self.columns.iter().find(|entry| entry.column == column)
    }
}

pub fn missing_report(df: &DataFrame, sensor_id: u32) -> Result<DataFrame> {
    summarize_missing(df, sensor_id).to_frame()
}

/// Human readable view of per-sensor missing percentages.
pub fn render_report_table(summaries: &[MissingSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("sensor"), Cell::new("rows")];
    header.extend(TRACKED_COLUMNS.iter().map(|name| Cell::new(format!("{name} %"))));
    table.set_header(header);

    for summary in summaries {
        let mut row = vec![
            Cell::new(summary.sensor_id),
            Cell::new(summary.total_rows),
        ];
        row.extend(summary.columns.iter().map(|entry| match entry.missing_percentage {
            Some(pct) => Cell::new(format!("{pct:.2}")),
            None => Cell::new("n/a"),
        }));
        table.add_row(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn counts_nulls_and_absent_columns() {
        let df = df![
            "P_plus" => [Some(1.0), None, Some(3.0)],
            "Q_plus" => [None::<f64>, None, None],
            "P_minus" => [Some(0.0), Some(0.0), Some(0.0)],
        ]
        .unwrap();

        let summary = summarize_missing(&df, 9);
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.get("P_plus").unwrap().missing_count, 1);
        assert_eq!(summary.get("P_plus").unwrap().missing_percentage, Some(33.33));
        assert_eq!(summary.get("Q_plus").unwrap().missing_percentage, Some(100.0));
        assert_eq!(summary.get("P_minus").unwrap().missing_count, 0);
        // absent columns count every row
        let v3 = summary.get("V_3").unwrap();
        assert_eq!(v3.missing_count, 3);
        assert_eq!(v3.missing_percentage, Some(100.0));
    }

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(percentage(2, 3), Some(66.67));
        assert_eq!(percentage(1, 8), Some(12.5));
        assert_eq!(percentage(0, 5), Some(0.0));
    }

    #[test]
    fn exact_halves_round_to_even() {
        // 1 / 800 is 0.125 percent
        assert_eq!(percentage(1, 800), Some(0.12));
        assert_eq!(percentage(1, 200), Some(0.5));
    }

    #[test]
    fn empty_table_reports_undefined_percentage() {
        let df = df!["P_plus" => Vec::<f64>::new()].unwrap();
        let summary = summarize_missing(&df, 1);
        assert!(summary
            .columns
            .iter()
            .all(|entry| entry.missing_count == 0 && entry.missing_percentage.is_none()));

        let frame = summary.to_frame().unwrap();
        assert_eq!(frame.column("V_1").unwrap().null_count(), 1);
    }

    #[test]
    fn frame_has_two_rows_per_sensor() {
        let df = df!["V_1" => [Some(1.0), None]].unwrap();
        let frame = missing_report(&df, 4).unwrap();

        let mut expected = vec![SENSOR_ID, METRIC];
        expected.extend(TRACKED_COLUMNS);
        assert_eq!(frame.get_column_names_str(), expected);
        assert_eq!(frame.height(), 2);

        let metric = frame.column(METRIC).unwrap().str().unwrap();
        assert_eq!(metric.get(0), Some(MISSING_COUNT));
        assert_eq!(metric.get(1), Some(MISSING_PERCENTAGE));

        let v1 = frame.column("V_1").unwrap().f64().unwrap();
        assert_eq!(v1.get(0), Some(1.0));
        assert_eq!(v1.get(1), Some(50.0));
    }

    #[test]
    fn renders_one_row_per_sensor() {
        let df = df!["V_1" => [Some(1.0), None]].unwrap();
        let rendered = render_report_table(&[summarize_missing(&df, 4)]).to_string();
        assert!(rendered.contains("V_1 %"));
        assert!(rendered.contains("50.00"));
    }
}
