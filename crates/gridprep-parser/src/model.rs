use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Row key shared by every normalized table.
pub const TIMESTAMP: &str = "timestamp";

/// Columns whose completeness is tracked by the missing-data report, in report order.
pub const TRACKED_COLUMNS: [&str; 7] = ["P_plus", "Q_plus", "P_minus", "Q_minus", "V_1", "V_2", "V_3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementKind {
    Power,
    Voltage,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::Power => "power",
            MeasurementKind::Voltage => "voltage",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerColumn {
    PPlus,
    PMinus,
    QPlus,
    QMinus,
}

impl PowerColumn {
    pub const ALL: [PowerColumn; 4] = [
        PowerColumn::PPlus,
        PowerColumn::PMinus,
        PowerColumn::QPlus,
        PowerColumn::QMinus,
    ];

    /// Header used by the meter export.
    pub fn source_name(&self) -> &'static str {
        match self {
            PowerColumn::PPlus => "Pplus_kW_",
            PowerColumn::PMinus => "Pminus_kW_",
            PowerColumn::QPlus => "Qplus_kvar_",
            PowerColumn::QMinus => "Qminus_kvar_",
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            PowerColumn::PPlus => "P_plus",
            PowerColumn::PMinus => "P_minus",
            PowerColumn::QPlus => "Q_plus",
            PowerColumn::QMinus => "Q_minus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    pub fn index(&self) -> usize {
        match self {
            Phase::L1 => 0,
            Phase::L2 => 1,
            Phase::L3 => 2,
        }
    }

    /// Label found in the `variable` column of the long-form export.
    pub fn source_label(&self) -> &'static str {
        match self {
            Phase::L1 => "V_L1",
            Phase::L2 => "V_L2",
            Phase::L3 => "V_L3",
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Phase::L1 => "V_1",
            Phase::L2 => "V_2",
            Phase::L3 => "V_3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl TryFrom<&str> for Phase {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "V_L1" => Ok(Phase::L1),
            "V_L2" => Ok(Phase::L2),
            "V_L3" => Ok(Phase::L3),
            other => Err(format!("unknown phase label '{other}'")),
        }
    }
}

/// Builds the `timestamp` column from microseconds since the epoch (naive wall time).
pub fn timestamp_column(micros: Vec<i64>) -> PolarsResult<Column> {
    let series = Series::new(TIMESTAMP.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok(series.into())
}
