//! Experimental recordings measured with the same library as simulated
//! traces, for side-by-side comparison.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{Measurement, MeasurementResult, MeasurementValues};
use crate::error::{MeasureError, StoreError};
use crate::measure::MeasureConfig;
use crate::model::{ParameterAxis, TimeSeries};

/// Unit conversion applied when loading a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingUnits {
    /// Multiplier taking recorded times to ms
    pub time_scale: f64,
    /// Multiplier taking recorded voltages to mV
    pub voltage_scale: f64,
}

impl Default for RecordingUnits {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            voltage_scale: 1.0,
        }
    }
}

/// Several sweeps sharing one time vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub time: Vec<f64>,
    pub traces: Vec<Vec<f64>>,
}

impl Recording {
    /// Load `{"time": [...], "traces": [[...], ...]}` and convert units
    pub fn load(path: &Path, units: &RecordingUnits) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", path.display())))?;
        let mut recording: Recording = serde_json::from_str(&content)
            .map_err(|e| StoreError::Parse(format!("Failed to parse {}: {e}", path.display())))?;

        if let Some(i) = recording
            .traces
            .iter()
            .position(|t| t.len() != recording.time.len())
        {
            return Err(StoreError::Parse(format!(
                "trace {i} in {} has {} samples, time vector has {}",
                path.display(),
                recording.traces[i].len(),
                recording.time.len()
            )));
        }

        recording.scale(units);
        Ok(recording)
    }

    fn scale(&mut self, units: &RecordingUnits) {
        self.time.iter_mut().for_each(|t| *t *= units.time_scale);
        for trace in &mut self.traces {
            trace.iter_mut().for_each(|v| *v *= units.voltage_scale);
        }
    }

    /// Interval between the first two samples
    pub fn sampling_interval(&self) -> Option<f64> {
        match self.time[..] {
            [t0, t1, ..] if t1 > t0 => Some(t1 - t0),
            _ => None,
        }
    }
}

/// Synthetic axis the sweeps of a recording are laid out on
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingAxis {
    pub label: String,
    pub min: f64,
    pub max: f64,
}

/// Measure every sweep of a recording.
///
/// The result has one output axis with one evenly spaced point per sweep
/// between `axis.min` and `axis.max`.
pub fn measure_recording(
    recording: &Recording,
    axis: &RecordingAxis,
    measurement: &Measurement,
    config: &MeasureConfig,
) -> Result<MeasurementResult, MeasureError> {
    let values = recording
        .traces
        .iter()
        .enumerate()
        .map(|(i, trace)| {
            let series = TimeSeries::with_time(trace, &recording.time, config.recstep)?;
            let value = measurement.on_series(&series, config)?;
            debug!(sweep = i, %measurement, value, "measured recording");
            Ok::<_, MeasureError>(value)
        })
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(MeasurementResult {
        measurement: measurement.clone(),
        label: measurement.label(),
        axes: vec![ParameterAxis::linspace(
            axis.label.clone(),
            axis.min,
            axis.max,
            recording.traces.len(),
        )],
        values: MeasurementValues::Vector(values),
    })
}
