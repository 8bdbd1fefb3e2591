//! Raw traces gathered onto the parameter grid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MappingError, RecordError};
use crate::measure::MeasureConfig;
use crate::model::{ParameterAxis, ParameterGrid, ResultSet};

use super::mapper::{MeasurementTarget, check_target_cell, locate};
use super::SweepGrid;

/// One trace per grid point, in declaration order of the axes.
///
/// Points without a record, or whose record has no entry for the cell, are
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceGrid {
    pub axes: Vec<ParameterAxis>,
    pub traces: SweepGrid<Option<Vec<f64>>>,
    /// Sample times of the (cut) traces
    pub time: Vec<f64>,
    /// Trace name, prefixed with the cell type when the network declares one
    pub label: String,
}

/// Collect the target trace of every record.
///
/// With `stable_time`, samples before `floor(stable_time / recstep)` are
/// dropped. Any number of axes is supported.
pub fn extract_traces(
    grid: &ParameterGrid,
    results: &ResultSet,
    target: &MeasurementTarget,
    stable_time: Option<f64>,
    config: &MeasureConfig,
) -> Result<TraceGrid, MappingError> {
    check_target_cell(results, target.cell)?;
    let located = locate(grid, results)?;

    let cut = stable_time.map_or(0, |t| (t / config.recstep).floor().max(0.0) as usize);
    let mut traces = SweepGrid::new(grid.shape(), None);
    let mut samples = 0;

    for entry in &located {
        match entry.record.trace(&target.field, target.cell) {
            Ok(trace) => {
                let trace = trace.get(cut..).unwrap_or_default().to_vec();
                samples = samples.max(trace.len());
                traces.set(&entry.indices, Some(trace));
            }
            Err(RecordError::MissingCell { .. }) => {
                debug!(key = %entry.key, cell = target.cell.0, "record has no trace for cell");
            }
            Err(source) => {
                return Err(MappingError::Record {
                    key: entry.key.clone(),
                    source,
                });
            }
        }
    }

    let cell_type = results
        .first()
        .and_then(|(_, record)| record.network().ok())
        .and_then(|net| net.cell_type(target.cell));
    let label = match cell_type {
        Some(cell_type) => format!("{cell_type} {}", target.field),
        None => target.field.to_string(),
    };

    Ok(TraceGrid {
        axes: grid.axes().to_vec(),
        traces,
        time: (0..samples)
            .map(|i| (cut + i) as f64 * config.recstep)
            .collect(),
        label,
    })
}
