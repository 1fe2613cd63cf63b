use std::io;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{parser} could not read {}: {source}", .path.display())]
    Io {
        parser: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} header is missing required column '{column}'")]
    MissingColumn {
        parser: &'static str,
        column: &'static str,
    },

    #[error("{parser} data row {line_index} invalid: {message}")]
    DataRow {
        parser: &'static str,
        line_index: usize,
        message: String,
    },

    #[error("{parser} data row {line_index} has unknown phase label '{label}'")]
    UnknownPhase {
        parser: &'static str,
        line_index: usize,
        label: String,
    },

    #[error("{parser} file did not contain any data rows")]
    EmptyData { parser: &'static str },

    #[error("{parser} failed to build dataframe: {source}")]
    Polars {
        parser: &'static str,
        #[source]
        source: PolarsError,
    },
}

impl ParserError {
    pub fn parser(&self) -> &'static str {
        match self {
            ParserError::Io { parser, .. }
            | ParserError::Csv { parser, .. }
            | ParserError::MissingColumn { parser, .. }
            | ParserError::DataRow { parser, .. }
            | ParserError::UnknownPhase { parser, .. }
            | ParserError::EmptyData { parser }
            | ParserError::Polars { parser, .. } => parser,
        }
    }

    /// True when the input file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ParserError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
