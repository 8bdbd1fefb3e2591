//! Maps one measurement over every record of a collected batch.
//!
//! Mapping runs in two steps. First every record is placed on the grid by
//! looking its parameter values up in the per-axis value maps, after the
//! network metadata of the first record has been checked against the target
//! cell. Only then are measurements computed, so a misaligned batch fails
//! before any trace is read.

use tracing::{debug, info};

use crate::error::{ConsistencyError, MappingError};
use crate::measure::MeasureConfig;
use crate::model::{
    CellId, CombinationKey, ParameterGrid, ResultRecord, ResultSet, TimeSeries, TraceField,
};

use super::{Measurement, MeasurementResult, MeasurementValues, SweepGrid};

/// Maximum number of output axes a mapped measurement supports
pub const MAX_OUTPUT_AXES: usize = 2;

/// Cell and trace a measurement reads from each record
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTarget {
    pub cell: CellId,
    pub field: TraceField,
}

impl MeasurementTarget {
    pub fn new(cell: CellId, field: TraceField) -> Self {
        Self { cell, field }
    }

    /// Somatic voltage of `cell`
    pub fn soma(cell: CellId) -> Self {
        Self::new(cell, TraceField::soma())
    }
}

/// A record together with its position on the grid
pub(crate) struct Located<'a> {
    pub key: &'a CombinationKey,
    pub record: &'a ResultRecord,
    pub indices: Vec<usize>,
}

/// Map a single measurement across `results`.
///
/// The output has one value per grid point; points without a record hold
/// `0.0`. With two axes the second declared axis is the outer dimension.
pub fn map_measurement(
    grid: &ParameterGrid,
    results: &ResultSet,
    target: &MeasurementTarget,
    measurement: &Measurement,
    config: &MeasureConfig,
) -> Result<MeasurementResult, MappingError> {
    let mut mapped = map_all(
        grid,
        results,
        target,
        std::slice::from_ref(measurement),
        config,
    )?;
    Ok(mapped.remove(0))
}

/// Map several measurements, validating and locating the records once
pub fn map_all(
    grid: &ParameterGrid,
    results: &ResultSet,
    target: &MeasurementTarget,
    measurements: &[Measurement],
    config: &MeasureConfig,
) -> Result<Vec<MeasurementResult>, MappingError> {
    grid.require_output_axes(MAX_OUTPUT_AXES)?;
    check_target_cell(results, target.cell)?;
    let located = locate(grid, results)?;

    let shape: Vec<usize> = grid.shape().into_iter().rev().collect();
    let mut mapped = Vec::with_capacity(measurements.len());
    for measurement in measurements {
        let mut values = SweepGrid::new(shape.clone(), 0.0);
        for entry in &located {
            let value = measure_record(entry, target, measurement, config)?;
            debug!(key = %entry.key, %measurement, value, "measured");
            let position: Vec<usize> = entry.indices.iter().rev().copied().collect();
            values.set(&position, value);
        }
        info!(
            %measurement,
            cell = target.cell.0,
            records = located.len(),
            points = values.len(),
            "mapped measurement"
        );
        mapped.push(MeasurementResult {
            measurement: measurement.clone(),
            label: measurement.label(),
            axes: grid.axes().to_vec(),
            values: MeasurementValues::from_grid(&values),
        });
    }
    Ok(mapped)
}

/// The cell declared at position `cell` in the first record's network must
/// carry gid `cell`. An empty result set passes.
pub(crate) fn check_target_cell(results: &ResultSet, cell: CellId) -> Result<(), ConsistencyError> {
    let Some((key, record)) = results.first() else {
        return Ok(());
    };
    let network = record
        .network()
        .map_err(|e| ConsistencyError::MissingNetwork {
            key: key.clone(),
            reason: e.to_string(),
        })?;
    network.check_cell(key, cell)
}

/// Place every record on the grid by value lookup
pub(crate) fn locate<'a>(
    grid: &ParameterGrid,
    results: &'a ResultSet,
) -> Result<Vec<Located<'a>>, ConsistencyError> {
    results
        .iter()
        .map(|(key, record)| {
            if record.param_values.len() != grid.ndim() {
                return Err(ConsistencyError::WrongArity {
                    key: key.clone(),
                    expected: grid.ndim(),
                    found: record.param_values.len(),
                });
            }
            let indices = record
                .param_values
                .iter()
                .zip(grid.axes())
                .enumerate()
                .map(|(axis, (value, declared))| {
                    grid.index_of(axis, value)
                        .ok_or_else(|| ConsistencyError::ValueNotInAxis {
                            key: key.clone(),
                            axis: declared.label.clone(),
                            value: value.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Located {
                key,
                record,
                indices,
            })
        })
        .collect()
}

fn measure_record(
    entry: &Located<'_>,
    target: &MeasurementTarget,
    measurement: &Measurement,
    config: &MeasureConfig,
) -> Result<f64, MappingError> {
    let key = entry.key;
    let record_err = |source| MappingError::Record {
        key: key.clone(),
        source,
    };
    let measure_err = |source| MappingError::Measure {
        key: key.clone(),
        source,
    };

    if measurement.uses_spike_train() {
        let train = entry.record.spike_train(target.cell).map_err(record_err)?;
        return measurement.on_spike_train(&train).map_err(measure_err);
    }

    let trace = entry
        .record
        .trace(&target.field, target.cell)
        .map_err(record_err)?;
    let series = TimeSeries::new(trace, config.recstep).map_err(measure_err)?;
    measurement.on_series(&series, config).map_err(measure_err)
}
