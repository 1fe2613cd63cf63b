use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Sensor 157 never reported usable data in the field deployment.
pub const DEFAULT_EXCLUDED_SENSOR: u32 = 157;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Everything a batch run needs to know: where inputs live, which sensors to visit, grid
/// steps and where to write results. Defaults reproduce the layout of the field deployment
/// (`Powers/`, `PhaseVoltages/`, `processed_data/`, sensors 1..=161 without 157).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub power_dir: PathBuf,
    pub voltage_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sensors: SensorSelection,
    pub power_step_minutes: u32,
    pub voltage_step_minutes: u32,
    pub resample_minutes: u32,
    pub resample: bool,
    pub merge: bool,
    pub failure_policy: FailurePolicy,
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            power_dir: PathBuf::from("Powers"),
            voltage_dir: PathBuf::from("PhaseVoltages"),
            output_dir: PathBuf::from("processed_data"),
            sensors: SensorSelection::default(),
            power_step_minutes: 15,
            voltage_step_minutes: 10,
            resample_minutes: 30,
            resample: false,
            merge: false,
            failure_policy: FailurePolicy::default(),
            output_format: OutputFormat::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading pipeline configuration");
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, minutes) in [
            ("power_step_minutes", self.power_step_minutes),
            ("voltage_step_minutes", self.voltage_step_minutes),
            ("resample_minutes", self.resample_minutes),
        ] {
            if minutes == 0 {
                return Err(PipelineError::Config(format!("{name} must be positive")));
            }
        }
        // buckets are anchored at midnight, which only holds when they tile the day
        if MINUTES_PER_DAY % self.resample_minutes != 0 {
            return Err(PipelineError::Config(format!(
                "resample_minutes must divide a day ({MINUTES_PER_DAY} minutes), got {}",
                self.resample_minutes
            )));
        }
        if let SensorSelection::Range { start, end, .. } = &self.sensors {
            if start > end {
                return Err(PipelineError::Config(format!(
                    "sensor range start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }

    pub fn power_path(&self, sensor_id: u32) -> PathBuf {
        self.power_dir.join(format!("{sensor_id}.csv"))
    }

    pub fn voltage_path(&self, sensor_id: u32) -> PathBuf {
        self.voltage_dir.join(format!("{sensor_id}.csv"))
    }

    pub fn power_step(&self) -> Duration {
        Duration::minutes(i64::from(self.power_step_minutes))
    }

    pub fn voltage_step(&self) -> Duration {
        Duration::minutes(i64::from(self.voltage_step_minutes))
    }

    pub fn resample_bucket(&self) -> Option<Duration> {
        self.resample
            .then(|| Duration::minutes(i64::from(self.resample_minutes)))
    }

    /// Sensor ids to visit, ascending and without duplicates.
    pub fn sensor_ids(&self) -> Result<Vec<u32>> {
        self.sensors.resolve(&self.power_dir)
    }

    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir
            .join(format!("{stem}.{}", self.output_format.extension()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SensorSelection {
    /// Inclusive id range with optional exclusions.
    Range {
        start: u32,
        end: u32,
        #[serde(default)]
        exclude: Vec<u32>,
    },
    List { ids: Vec<u32> },
    /// Every `<power_dir>/<id>.csv` with a numeric stem.
    Discover,
}

impl Default for SensorSelection {
    fn default() -> Self {
        SensorSelection::Range {
            start: 1,
            end: 161,
            exclude: vec![DEFAULT_EXCLUDED_SENSOR],
        }
    }
}

impl SensorSelection {
    /// Parses a command-line list such as `1-3,7,10-12`.
    pub fn parse_list(spec: &str) -> Result<Self> {
        let mut ids = BTreeSet::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_id(lo)?;
                    let hi = parse_id(hi)?;
                    if lo > hi {
                        return Err(PipelineError::Config(format!(
                            "invalid sensor range '{part}'"
                        )));
                    }
                    ids.extend(lo..=hi);
                }
                None => {
                    ids.insert(parse_id(part)?);
                }
            }
        }
        if ids.is_empty() {
            return Err(PipelineError::Config(format!(
                "sensor list '{spec}' selects nothing"
            )));
        }
        Ok(SensorSelection::List {
            ids: ids.into_iter().collect(),
        })
    }

    pub fn resolve(&self, power_dir: &Path) -> Result<Vec<u32>> {
        let ids: BTreeSet<u32> = match self {
            SensorSelection::Range {
                start,
                end,
                exclude,
            } => (*start..=*end).filter(|id| !exclude.contains(id)).collect(),
            SensorSelection::List { ids } => ids.iter().copied().collect(),
            SensorSelection::Discover => discover_sensor_ids(power_dir)?,
        };
        Ok(ids.into_iter().collect())
    }
}

fn parse_id(value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|err| PipelineError::Config(format!("invalid sensor id '{value}': {err}")))
}

fn discover_sensor_ids(power_dir: &Path) -> Result<BTreeSet<u32>> {
    let pattern = power_dir.join("*.csv");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|err| PipelineError::Config(format!("invalid discovery pattern: {err}")))?;

    let mut ids = BTreeSet::new();
    for entry in entries {
        let path = entry.map_err(|err| PipelineError::Io(err.into_error()))?;
        match path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u32>().ok())
        {
            Some(id) => {
                ids.insert(id);
            }
            None => debug!(path = %path.display(), "ignoring non-sensor file"),
        }
    }
    Ok(ids)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failing sensor, leave it out of the combined tables and keep going.
    #[default]
    Isolate,
    /// Abort the run on the first failing sensor.
    FailFast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}
