use std::fs;
use std::path::Path;

use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::formats::{PowerParser, VoltageParser};

pub trait MeasurementParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str) -> Result<DataFrame, ParserError>;
}

pub fn parse_measurement_file(
    parser: &dyn MeasurementParser,
    path: &Path,
) -> Result<DataFrame, ParserError> {
    let content = fs::read_to_string(path).map_err(|source| ParserError::Io {
        parser: parser.name(),
        path: path.to_path_buf(),
        source,
    })?;
    parser.parse(&content)
}

pub fn parse_power_file(path: &Path) -> Result<DataFrame, ParserError> {
    parse_measurement_file(&PowerParser, path)
}

pub fn parse_voltage_file(path: &Path) -> Result<DataFrame, ParserError> {
    parse_measurement_file(&VoltageParser, path)
}
