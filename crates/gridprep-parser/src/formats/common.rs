use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::errors::ParserError;

/// Meter exports write timestamps as `01-Jan-2023 00:15:00.000000`.
pub(crate) const TIMESTAMP_FORMATS: &[&str] = &["%d-%b-%Y %H:%M:%S%.f", "%d-%b-%Y %H:%M:%S"];

pub(crate) fn csv_reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

pub(crate) fn read_headers(
    parser: &'static str,
    reader: &mut csv::Reader<&[u8]>,
) -> Result<StringRecord, ParserError> {
    reader
        .headers()
        .cloned()
        .map_err(|source| ParserError::Csv { parser, source })
}

/// Position of a required header column. Matching is exact after trimming.
pub(crate) fn column_index(
    parser: &'static str,
    headers: &StringRecord,
    column: &'static str,
) -> Result<usize, ParserError> {
    headers
        .iter()
        .position(|name| name.trim() == column)
        .ok_or(ParserError::MissingColumn { parser, column })
}

pub(crate) fn optional_column_index(headers: &StringRecord, column: &str) -> Option<usize> {
    headers.iter().position(|name| name.trim() == column)
}

pub(crate) fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or("")
}

pub(crate) fn parse_timestamp(
    parser: &'static str,
    value: &str,
    line_index: usize,
) -> Result<i64, ParserError> {
    let trimmed = value.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.and_utc().timestamp_micros());
        }
    }
    Err(ParserError::DataRow {
        parser,
        line_index,
        message: format!("invalid timestamp '{trimmed}'"),
    })
}

pub(crate) fn parse_optional_f64(
    parser: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_nan() => Ok(None),
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_and_whole_second_timestamps() {
        let with_fraction = parse_timestamp("TEST", "01-Jan-2023 00:15:00.000000", 2).unwrap();
        let whole = parse_timestamp("TEST", "01-Jan-2023 00:15:00", 2).unwrap();
        assert_eq!(with_fraction, whole);
        assert_eq!(with_fraction, 1_672_532_100_000_000);
    }

    #[test]
    fn rejects_iso_timestamps() {
        let err = parse_timestamp("TEST", "2023-01-01 00:15:00", 7).unwrap_err();
        assert!(matches!(err, ParserError::DataRow { line_index: 7, .. }));
    }

    #[test]
    fn nan_and_blank_are_null() {
        assert_eq!(parse_optional_f64("TEST", "", 2, "x").unwrap(), None);
        assert_eq!(parse_optional_f64("TEST", "NaN", 2, "x").unwrap(), None);
        assert_eq!(parse_optional_f64("TEST", " 1.5 ", 2, "x").unwrap(), Some(1.5));
        assert!(parse_optional_f64("TEST", "abc", 2, "x").is_err());
    }
}
