pub mod aggregate;
pub mod config;
pub mod error;
pub mod grid;
pub mod merge;
pub mod net_power;
pub mod outputs;
pub mod report;
pub mod resample;

/// Column attached to every output row to identify its source sensor.
pub const SENSOR_ID: &str = "sensor_id";

pub use aggregate::{
    load_and_process, process_sensor, run_batch, BatchResult, BatchTables, ProcessOptions,
    SensorOutput, SkippedSensor,
};
pub use config::{FailurePolicy, OutputFormat, PipelineConfig, SensorSelection};
pub use error::{PipelineError, Result};
