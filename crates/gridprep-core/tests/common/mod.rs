#![allow(dead_code)]

use std::fs;
use std::path::Path;

use gridprep_core::{PipelineConfig, SensorSelection};

/// Minutes after 2023-01-01 00:00 in the meter export format.
pub fn meter_time(minutes: u32) -> String {
    format!(
        "01-Jan-2023 {:02}:{:02}:00.000000",
        minutes / 60,
        minutes % 60
    )
}

pub fn write_power(dir: &Path, sensor_id: u32, minutes: &[u32]) {
    let mut content = String::from("Time,Pplus_kW_,Pminus_kW_,Qplus_kvar_,Qminus_kvar_\n");
    for (idx, minute) in minutes.iter().enumerate() {
        content.push_str(&format!(
            "{},{}.5,0.0,0.{},0.0\n",
            meter_time(*minute),
            idx,
            idx + 1
        ));
    }
    fs::create_dir_all(dir.join("Powers")).unwrap();
    fs::write(dir.join("Powers").join(format!("{sensor_id}.csv")), content).unwrap();
}

/// Each entry is `(minute, phase labels present)`.
pub fn write_voltage(dir: &Path, sensor_id: u32, readings: &[(u32, &[&str])]) {
    let mut content = String::from("time,serialno,variable,value\n");
    for (minute, phases) in readings {
        for (offset, phase) in phases.iter().enumerate() {
            content.push_str(&format!(
                "{},SN{sensor_id},{phase},{}\n",
                meter_time(*minute),
                230 + offset
            ));
        }
    }
    fs::create_dir_all(dir.join("PhaseVoltages")).unwrap();
    fs::write(
        dir.join("PhaseVoltages").join(format!("{sensor_id}.csv")),
        content,
    )
    .unwrap();
}

pub const ALL_PHASES: &[&str] = &["V_L1", "V_L2", "V_L3"];

pub fn config_for(dir: &Path, ids: &[u32]) -> PipelineConfig {
    PipelineConfig {
        power_dir: dir.join("Powers"),
        voltage_dir: dir.join("PhaseVoltages"),
        output_dir: dir.join("processed_data"),
        sensors: SensorSelection::List { ids: ids.to_vec() },
        ..PipelineConfig::default()
    }
}

/// Three sensors with different coverage:
/// sensor 1: power 4 aligned rows, voltage 3
/// sensor 2: power 1, voltage 4
/// sensor 5: power 5, voltage 2
pub fn write_three_sensors(dir: &Path) {
    write_power(dir, 1, &[0, 15, 45]);
    write_voltage(dir, 1, &[(0, ALL_PHASES), (20, &["V_L1"][..])]);

    write_power(dir, 2, &[30]);
    write_voltage(
        dir,
        2,
        &[(0, ALL_PHASES), (10, ALL_PHASES), (20, ALL_PHASES), (30, ALL_PHASES)],
    );

    write_power(dir, 5, &[0, 60]);
    write_voltage(dir, 5, &[(0, &["V_L1", "V_L2"][..]), (10, ALL_PHASES)]);
}
