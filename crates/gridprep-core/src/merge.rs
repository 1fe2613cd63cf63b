use gridprep_parser::TIMESTAMP;
use polars::lazy::dsl::col;
use polars::prelude::*;

use crate::error::Result;
use crate::SENSOR_ID;

/// Full outer join of a power and a voltage table on `timestamp`.
///
/// Every timestamp present on either side appears exactly once, in ascending order; fields from
/// the side that lacks a timestamp are null. An empty side only contributes its (null) columns.
pub fn outer_merge(power: &DataFrame, voltage: &DataFrame) -> Result<DataFrame> {
    let merged = power
        .clone()
        .lazy()
        .join(
            voltage.clone().lazy(),
            [col(TIMESTAMP)],
            [col(TIMESTAMP)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .sort([TIMESTAMP], SortMultipleOptions::default())
        .collect()?;
    Ok(merged)
}

/// Appends a constant `sensor_id` column so rows stay traceable after concatenation.
pub fn tag_sensor(df: &DataFrame, sensor_id: u32) -> Result<DataFrame> {
    let mut tagged = df.clone();
    let ids = Series::new(SENSOR_ID.into(), vec![sensor_id; df.height()]);
    tagged.with_column(ids)?;
    Ok(tagged)
}
