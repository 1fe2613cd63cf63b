pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::ParserError;
pub use formats::{PowerParser, VoltageParser};
pub use model::{
    timestamp_column, MeasurementKind, Phase, PowerColumn, TIMESTAMP, TRACKED_COLUMNS,
};
pub use registry::{
    parse_measurement_file, parse_power_file, parse_voltage_file, MeasurementParser,
};
