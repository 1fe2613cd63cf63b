use std::path::PathBuf;

use chrono::Duration;
use gridprep_parser::{parse_power_file, parse_voltage_file, MeasurementKind};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::grid::align_to_grid;
use crate::merge::{outer_merge, tag_sensor};
use crate::net_power::net_power;
use crate::outputs::{write_frame, write_run_summary, RunSummary, WrittenOutput};
use crate::report::{summarize_missing, MissingSummary};
use crate::resample::resample_mean;

pub const POWER_OUTPUT: &str = "all_sensors_power_data";
pub const VOLTAGE_OUTPUT: &str = "all_sensors_voltage_data";
pub const MERGED_OUTPUT: &str = "all_sensors_data";
pub const REPORT_OUTPUT: &str = "all_sensors_info";
pub const REPORT_RESAMPLED_OUTPUT: &str = "all_sensors_info_resampled";
pub const NET_POWER_OUTPUT: &str = "all_sensors_net_power";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Per-sensor processing knobs, usually derived from a [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub power_step: Duration,
    pub voltage_step: Duration,
    pub resample: Option<Duration>,
    pub merge: bool,
}

impl From<&PipelineConfig> for ProcessOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            power_step: config.power_step(),
            voltage_step: config.voltage_step(),
            resample: config.resample_bucket(),
            merge: config.merge,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SensorOutput {
    Split { power: DataFrame, voltage: DataFrame },
    Merged(DataFrame),
}

impl SensorOutput {
    pub fn row_count(&self) -> usize {
        match self {
            SensorOutput::Split { power, voltage } => power.height() + voltage.height(),
            SensorOutput::Merged(df) => df.height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSensor {
    pub sensor_id: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum BatchTables {
    Split { power: DataFrame, voltage: DataFrame },
    Merged(DataFrame),
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub processed: Vec<u32>,
    pub skipped: Vec<SkippedSensor>,
    pub tables: BatchTables,
}

#[derive(Debug, Clone)]
pub struct ReportResult {
    pub processed: Vec<u32>,
    pub skipped: Vec<SkippedSensor>,
    pub summaries: Vec<MissingSummary>,
    pub table: DataFrame,
}

#[derive(Debug, Clone)]
pub struct NetPowerResult {
    pub processed: Vec<u32>,
    pub skipped: Vec<SkippedSensor>,
    pub table: DataFrame,
}

/// Reads both files of one sensor.
pub fn load_sensor(config: &PipelineConfig, sensor_id: u32) -> Result<(DataFrame, DataFrame)> {
    let power = parse_power_file(&config.power_path(sensor_id))?;
    let voltage = parse_voltage_file(&config.voltage_path(sensor_id))?;
    debug!(
        sensor_id,
        power_rows = power.height(),
        voltage_rows = voltage.height(),
        "loaded sensor files"
    );
    Ok((power, voltage))
}

/// Aligns one table to its grid and, when a bucket is given, averages it into that bucket.
fn prepare_table(
    df: &DataFrame,
    step: Duration,
    resample: Option<Duration>,
    sensor_id: u32,
    kind: MeasurementKind,
) -> Result<DataFrame> {
    let aligned = align_to_grid(df, step)?;
    debug!(sensor_id, kind = %kind, rows = aligned.height(), "aligned to grid");
    match resample {
        Some(bucket) => resample_mean(&aligned, bucket),
        None => Ok(aligned),
    }
}

fn prepare_pair(
    sensor_id: u32,
    power: &DataFrame,
    voltage: &DataFrame,
    options: ProcessOptions,
) -> Result<(DataFrame, DataFrame)> {
    let power = prepare_table(
        power,
        options.power_step,
        options.resample,
        sensor_id,
        MeasurementKind::Power,
    )?;
    let voltage = prepare_table(
        voltage,
        options.voltage_step,
        options.resample,
        sensor_id,
        MeasurementKind::Voltage,
    )?;
    Ok((power, voltage))
}

/// Grid-aligns, optionally resamples, then merges or tags one sensor's tables.
pub fn process_sensor(
    sensor_id: u32,
    power: &DataFrame,
    voltage: &DataFrame,
    options: ProcessOptions,
) -> Result<SensorOutput> {
    let (power, voltage) = prepare_pair(sensor_id, power, voltage, options)?;

    if options.merge {
        let merged = outer_merge(&power, &voltage)?;
        return Ok(SensorOutput::Merged(tag_sensor(&merged, sensor_id)?));
    }

    Ok(SensorOutput::Split {
        power: tag_sensor(&power, sensor_id)?,
        voltage: tag_sensor(&voltage, sensor_id)?,
    })
}

pub fn load_and_process(config: &PipelineConfig, sensor_id: u32) -> Result<SensorOutput> {
    let (power, voltage) = load_sensor(config, sensor_id)?;
    process_sensor(sensor_id, &power, &voltage, ProcessOptions::from(config))
}

/// Runs `step` for each selected sensor in ascending id order, applying the failure policy.
fn for_each_sensor<T>(
    config: &PipelineConfig,
    mut step: impl FnMut(u32) -> Result<T>,
) -> Result<(Vec<(u32, T)>, Vec<SkippedSensor>)> {
    let sensor_ids = config.sensor_ids()?;
    if sensor_ids.is_empty() {
        return Err(PipelineError::Config(
            "sensor selection is empty".to_string(),
        ));
    }

    let mut done = Vec::with_capacity(sensor_ids.len());
    let mut skipped = Vec::new();
    for sensor_id in sensor_ids.iter().copied() {
        info!(sensor_id, "Processing sensor");
        match step(sensor_id) {
            Ok(value) => done.push((sensor_id, value)),
            Err(err) => match config.failure_policy {
                FailurePolicy::FailFast => {
                    return Err(PipelineError::Sensor {
                        sensor_id,
                        source: Box::new(err),
                    });
                }
                FailurePolicy::Isolate => {
                    warn!(sensor_id, error = %err, "skipping sensor");
                    skipped.push(SkippedSensor {
                        sensor_id,
                        reason: err.to_string(),
                    });
                }
            },
        }
    }

    if done.is_empty() {
        return Err(PipelineError::NoSensorsProcessed {
            attempted: sensor_ids.len(),
        });
    }
    Ok((done, skipped))
}

/// Processes every selected sensor and stacks the results into combined tables.
pub fn run_batch(config: &PipelineConfig) -> Result<BatchResult> {
    let (outputs, skipped) = for_each_sensor(config, |id| load_and_process(config, id))?;

    let processed: Vec<u32> = outputs.iter().map(|(id, _)| *id).collect();
    let mut power_frames = Vec::new();
    let mut voltage_frames = Vec::new();
    let mut merged_frames = Vec::new();
    for (_, output) in outputs {
        match output {
            SensorOutput::Split { power, voltage } => {
                power_frames.push(power);
                voltage_frames.push(voltage);
            }
            SensorOutput::Merged(df) => merged_frames.push(df),
        }
    }

    let tables = if config.merge {
        BatchTables::Merged(concat_frames(merged_frames)?)
    } else {
        BatchTables::Split {
            power: concat_frames(power_frames)?,
            voltage: concat_frames(voltage_frames)?,
        }
    };

    info!(
        processed = processed.len(),
        skipped = skipped.len(),
        "batch complete"
    );
    Ok(BatchResult {
        processed,
        skipped,
        tables,
    })
}

/// Persists the combined tables and a run summary under the output directory.
pub fn write_batch(result: &mut BatchResult, config: &PipelineConfig) -> Result<Vec<WrittenOutput>> {
    let written = match &mut result.tables {
        BatchTables::Split { power, voltage } => vec![
            write_frame(power, &config.output_path(POWER_OUTPUT))?,
            write_frame(voltage, &config.output_path(VOLTAGE_OUTPUT))?,
        ],
        BatchTables::Merged(merged) => {
            vec![write_frame(merged, &config.output_path(MERGED_OUTPUT))?]
        }
    };

    let summary = RunSummary::new(
        "process",
        config,
        &result.processed,
        &result.skipped,
        &written,
    );
    write_run_summary(&summary, &summary_path(config))?;
    Ok(written)
}

/// Missing-data report over each sensor's merged (and optionally resampled) table.
pub fn report_batch(config: &PipelineConfig) -> Result<ReportResult> {
    let options = ProcessOptions::from(config);
    let (outputs, skipped) = for_each_sensor(config, |id| {
        let (power, voltage) = load_sensor(config, id)?;
        let (power, voltage) = prepare_pair(id, &power, &voltage, options)?;
        let merged = outer_merge(&power, &voltage)?;
        Ok(summarize_missing(&merged, id))
    })?;

    let processed: Vec<u32> = outputs.iter().map(|(id, _)| *id).collect();
    let summaries: Vec<MissingSummary> = outputs.into_iter().map(|(_, s)| s).collect();
    let frames = summaries
        .iter()
        .map(MissingSummary::to_frame)
        .collect::<Result<Vec<_>>>()?;

    Ok(ReportResult {
        processed,
        skipped,
        summaries,
        table: concat_frames(frames)?,
    })
}

pub fn write_report(report: &mut ReportResult, config: &PipelineConfig) -> Result<WrittenOutput> {
    let stem = if config.resample {
        REPORT_RESAMPLED_OUTPUT
    } else {
        REPORT_OUTPUT
    };
    let written = write_frame(&mut report.table, &config.output_path(stem))?;

    let outputs = [written.clone()];
    let summary = RunSummary::new(
        "report",
        config,
        &report.processed,
        &report.skipped,
        &outputs,
    );
    write_run_summary(&summary, &summary_path(config))?;
    Ok(written)
}

/// Net active/reactive power for every processed sensor, from its aligned (and optionally
/// resampled) power table. Both files must load for a sensor to count as processed.
pub fn net_power_batch(config: &PipelineConfig) -> Result<NetPowerResult> {
    let options = ProcessOptions::from(config);
    let (outputs, skipped) = for_each_sensor(config, |id| {
        let (power, _voltage) = load_sensor(config, id)?;
        let power = prepare_table(
            &power,
            options.power_step,
            options.resample,
            id,
            MeasurementKind::Power,
        )?;
        net_power(&tag_sensor(&power, id)?)
    })?;

    let processed: Vec<u32> = outputs.iter().map(|(id, _)| *id).collect();
    let frames: Vec<DataFrame> = outputs.into_iter().map(|(_, df)| df).collect();
    Ok(NetPowerResult {
        processed,
        skipped,
        table: concat_frames(frames)?,
    })
}

pub fn write_net_power(
    result: &mut NetPowerResult,
    config: &PipelineConfig,
) -> Result<WrittenOutput> {
    let written = write_frame(&mut result.table, &config.output_path(NET_POWER_OUTPUT))?;
    let outputs = [written.clone()];
    let summary = RunSummary::new(
        "net-power",
        config,
        &result.processed,
        &result.skipped,
        &outputs,
    );
    write_run_summary(&summary, &summary_path(config))?;
    Ok(written)
}

/// Vertically stacks per-sensor frames in order into a single chunk. All frames must share one
/// schema.
pub fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut iter = frames.into_iter();
    let Some(mut combined) = iter.next() else {
        return Ok(DataFrame::default());
    };
    for df in iter {
        combined.vstack_mut(&df)?;
    }
    combined.as_single_chunk_par();
    Ok(combined)
}

fn summary_path(config: &PipelineConfig) -> PathBuf {
    config.output_dir.join(RUN_SUMMARY_FILE)
}
