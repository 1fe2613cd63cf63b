// crates/gridprep-core/src/error.rs

use gridprep_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input parsing failed: {0}")]
    Parser(#[from] ParserError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file is invalid: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("table has {count} duplicated timestamp(s), first at {first}")]
    DuplicateTimestamp { count: usize, first: chrono::NaiveDateTime },

    #[error("sensor {sensor_id} failed: {source}")]
    Sensor {
        sensor_id: u32,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("none of the {attempted} selected sensors could be processed")]
    NoSensorsProcessed { attempted: usize },

    #[error("Data processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
