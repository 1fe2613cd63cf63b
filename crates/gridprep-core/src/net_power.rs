use gridprep_parser::TIMESTAMP;
use polars::lazy::dsl::col;
use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::SENSOR_ID;

pub const NET_ACTIVE: &str = "P";
pub const NET_REACTIVE: &str = "Q";

const REQUIRED: [&str; 4] = ["P_plus", "P_minus", "Q_plus", "Q_minus"];

/// Net active and reactive power, `P = P_plus - P_minus` and `Q = Q_plus - Q_minus`.
/// A null on either side gives a null result. `timestamp` and `sensor_id` are kept when present.
pub fn net_power(df: &DataFrame) -> Result<DataFrame> {
    let names = df.get_column_names();
    if let Some(missing) = REQUIRED
        .iter()
        .find(|required| !names.iter().any(|name| name.as_str() == **required))
    {
        return Err(PipelineError::Processing(format!(
            "net power requires column '{missing}'"
        )));
    }

    let mut exprs = Vec::with_capacity(4);
    if names.iter().any(|name| name.as_str() == TIMESTAMP) {
        exprs.push(col(TIMESTAMP));
    }
    exprs.push((col("P_plus") - col("P_minus")).alias(NET_ACTIVE));
    exprs.push((col("Q_plus") - col("Q_minus")).alias(NET_REACTIVE));
    if names.iter().any(|name| name.as_str() == SENSOR_ID) {
        exprs.push(col(SENSOR_ID));
    }

    Ok(df.clone().lazy().select(exprs).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn subtracts_directions_and_propagates_nulls() {
        let df = df![
            "P_plus" => [Some(5.0), None, Some(1.0)],
            "P_minus" => [Some(2.0), Some(1.0), Some(3.0)],
            "Q_plus" => [Some(0.5), Some(0.5), None],
            "Q_minus" => [Some(0.25), Some(0.0), Some(0.0)],
            "sensor_id" => [7u32, 7, 7],
        ]
        .unwrap();

        let out = net_power(&df).unwrap();
        assert_eq!(out.get_column_names_str(), vec![NET_ACTIVE, NET_REACTIVE, SENSOR_ID]);

        let p = out.column(NET_ACTIVE).unwrap().f64().unwrap();
        assert_eq!(p.get(0), Some(3.0));
        assert_eq!(p.get(1), None);
        assert_eq!(p.get(2), Some(-2.0));

        let q = out.column(NET_REACTIVE).unwrap().f64().unwrap();
        assert_eq!(q.get(0), Some(0.25));
        assert_eq!(q.get(2), None);
    }

    #[test]
    fn voltage_table_is_rejected() {
        let df = df!["V_1" => [230.0]].unwrap();
        let err = net_power(&df).unwrap_err();
        assert!(matches!(err, PipelineError::Processing(_)));
    }
}
