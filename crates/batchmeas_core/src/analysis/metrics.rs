//! Measurements that can be mapped across a batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MeasureError;
use crate::measure::{self, MeasureConfig};
use crate::model::{ParameterAxis, TimeSeries};

use super::SweepGrid;

/// Scalar measurements available to the batch mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Measurement {
    PlateauAmplitude,
    PlateauDuration,
    NumSpikes,
    SpikeFrequency,
    TimeToFirstSpike,
    FirstInterspikeInterval,
    /// Spike count from the recorded spike train of the target cell
    RecordedSpikeCount,
    /// Spike rate from the recorded spike train of the target cell
    RecordedSpikeFrequency,
    /// Back-propagating action potential amplitude for a stimulus at `stim_time`
    BackpropAmplitude { stim_time: f64 },
}

impl Measurement {
    /// Display label with units
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::PlateauAmplitude => "Plateau amplitude (mV)".to_string(),
            Self::PlateauDuration => "Plateau duration (ms)".to_string(),
            Self::NumSpikes => "Number of spikes".to_string(),
            Self::SpikeFrequency => "Spike frequency (Hz)".to_string(),
            Self::TimeToFirstSpike => "Time to first spike (ms)".to_string(),
            Self::FirstInterspikeInterval => "First interspike interval (ms)".to_string(),
            Self::RecordedSpikeCount => "Recorded spikes".to_string(),
            Self::RecordedSpikeFrequency => "Recorded spike frequency (Hz)".to_string(),
            Self::BackpropAmplitude { stim_time } => {
                format!("bAP amplitude @ {stim_time} ms (mV)")
            }
        }
    }

    /// Short label suitable for column headers
    #[must_use]
    pub fn short_label(&self) -> &str {
        match self {
            Self::PlateauAmplitude => "Plateau amp",
            Self::PlateauDuration => "Plateau dur",
            Self::NumSpikes => "Spikes",
            Self::SpikeFrequency => "Freq",
            Self::TimeToFirstSpike => "TTFS",
            Self::FirstInterspikeInterval => "ISI",
            Self::RecordedSpikeCount => "Rec spikes",
            Self::RecordedSpikeFrequency => "Rec freq",
            Self::BackpropAmplitude { .. } => "bAP amp",
        }
    }

    /// Identifier accepted by `FromStr`
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::PlateauAmplitude => "plateau_amplitude".to_string(),
            Self::PlateauDuration => "plateau_duration".to_string(),
            Self::NumSpikes => "num_spikes".to_string(),
            Self::SpikeFrequency => "spike_frequency".to_string(),
            Self::TimeToFirstSpike => "time_to_first_spike".to_string(),
            Self::FirstInterspikeInterval => "first_interspike_interval".to_string(),
            Self::RecordedSpikeCount => "recorded_spike_count".to_string(),
            Self::RecordedSpikeFrequency => "recorded_spike_frequency".to_string(),
            Self::BackpropAmplitude { stim_time } => format!("backprop_amplitude={stim_time}"),
        }
    }

    /// Whether the measurement reads the recorded spike train instead of a trace
    #[must_use]
    pub fn uses_spike_train(&self) -> bool {
        matches!(self, Self::RecordedSpikeCount | Self::RecordedSpikeFrequency)
    }

    /// Evaluate on a single trace
    pub fn on_series(
        &self,
        series: &TimeSeries<'_>,
        config: &MeasureConfig,
    ) -> Result<f64, MeasureError> {
        let threshold = config.spike_threshold;
        match self {
            Self::PlateauAmplitude => Ok(measure::plateau_amplitude(series, config)?.amplitude),
            Self::PlateauDuration => Ok(measure::plateau_duration(series, config)?.duration),
            Self::NumSpikes => Ok(measure::num_spikes(series, threshold) as f64),
            Self::SpikeFrequency => Ok(measure::spike_frequency(series, threshold)),
            Self::TimeToFirstSpike => Ok(measure::time_to_first_spike(
                series,
                threshold,
                config.syn_time,
            )),
            Self::FirstInterspikeInterval => {
                Ok(measure::first_interspike_interval(series, threshold))
            }
            Self::BackpropAmplitude { stim_time } => {
                measure::backprop_amplitude(series, *stim_time)
            }
            Self::RecordedSpikeCount | Self::RecordedSpikeFrequency => {
                Err(MeasureError::NeedsSpikeTrain(self.name()))
            }
        }
    }

    /// Evaluate on a recorded spike train
    pub fn on_spike_train(&self, times: &[f64]) -> Result<f64, MeasureError> {
        match self {
            Self::RecordedSpikeCount => Ok(times.len() as f64),
            Self::RecordedSpikeFrequency => Ok(measure::frequency_of(times)),
            _ => Err(MeasureError::NeedsSpikeTrain(self.name())),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Measurement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let measurement = match name {
            "plateau_amplitude" => Self::PlateauAmplitude,
            "plateau_duration" => Self::PlateauDuration,
            "num_spikes" => Self::NumSpikes,
            "spike_frequency" => Self::SpikeFrequency,
            "time_to_first_spike" => Self::TimeToFirstSpike,
            "first_interspike_interval" => Self::FirstInterspikeInterval,
            "recorded_spike_count" => Self::RecordedSpikeCount,
            "recorded_spike_frequency" => Self::RecordedSpikeFrequency,
            "backprop_amplitude" => {
                let stim_time = arg
                    .ok_or("backprop_amplitude needs a stimulus time, e.g. backprop_amplitude=250")?
                    .parse::<f64>()
                    .map_err(|e| format!("invalid stimulus time: {e}"))?;
                return Ok(Self::BackpropAmplitude { stim_time });
            }
            other => return Err(format!("unknown measurement '{other}'")),
        };
        match arg {
            Some(_) => Err(format!("measurement '{name}' takes no argument")),
            None => Ok(measurement),
        }
    }
}

/// Mapped values in output layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValues {
    /// One value per point of the single output axis
    Vector(Vec<f64>),
    /// `rows[i2][i1]`: second axis outer, first axis inner
    Matrix(Vec<Vec<f64>>),
}

impl MeasurementValues {
    /// Build the output layout from a grid stored with axes reversed
    pub(crate) fn from_grid(grid: &SweepGrid<f64>) -> Self {
        if grid.ndim() <= 1 {
            MeasurementValues::Vector(grid.data().to_vec())
        } else {
            MeasurementValues::Matrix(grid.rows().map(<[f64]>::to_vec).collect())
        }
    }
}

/// A measurement mapped across a batch (or across a recording)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub measurement: Measurement,
    pub label: String,
    /// Output axes in declaration order
    pub axes: Vec<ParameterAxis>,
    pub values: MeasurementValues,
}

impl MeasurementResult {
    /// Value at a combination given in declaration order
    pub fn at(&self, indices: &[usize]) -> Option<f64> {
        match (&self.values, indices) {
            (MeasurementValues::Vector(values), [i]) => values.get(*i).copied(),
            (MeasurementValues::Matrix(rows), [i1, i2]) => rows.get(*i2)?.get(*i1).copied(),
            _ => None,
        }
    }
}
