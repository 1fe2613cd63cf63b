mod common;
mod power;
mod voltage;

pub use power::PowerParser;
pub use voltage::VoltageParser;

pub(crate) use common::{
    column_index, csv_reader, field, optional_column_index, parse_optional_f64, parse_timestamp,
    read_headers,
};
