//! Measurements on a single recorded trace.
//!
//! Every function here is pure: it reads one [`TimeSeries`] plus scalar
//! settings and returns numbers. Slices are half-open throughout, and the
//! plateau functions share one set of conventions:
//!
//! - `stableIndex = floor(stable_time / recstep)`,
//!   `synIndex = floor(syn_time / recstep) - 1`
//! - the baseline is the spike-clipped mean of `[stableIndex, synIndex)`
//! - only samples with index strictly greater than `synIndex` count as
//!   post-stimulus
//! - if clipping removes every sample of a non-empty window, the unclipped
//!   window mean is used instead

use serde::{Deserialize, Serialize};

use crate::error::MeasureError;
use crate::model::TimeSeries;

/// Settings shared by the trace measurements (ms and mV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Sampling interval of the recorded traces
    pub recstep: f64,
    /// Spike peaks must exceed this voltage
    pub spike_threshold: f64,
    /// Width of the region excised around each spike peak
    pub spike_width: f64,
    /// Offset above baseline a sample must reach to belong to a plateau
    pub plateau_threshold: f64,
    /// Time after which the trace is considered settled
    pub stable_time: f64,
    /// Stimulus onset (glutamate release)
    pub syn_time: f64,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            recstep: 0.1,
            spike_threshold: -20.0,
            spike_width: 3.0,
            plateau_threshold: 10.0,
            stable_time: 50.0,
            syn_time: 200.0,
        }
    }
}

/// Detected spike peaks, ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spikes {
    pub times: Vec<f64>,
    pub indices: Vec<usize>,
}

impl Spikes {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Samples left after spike regions were excised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipped {
    pub samples: Vec<f64>,
    pub times: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plateau {
    /// Plateau voltage minus baseline; negative values are reported as-is
    pub amplitude: f64,
    /// Mean spike-clipped voltage over the plateau window
    pub voltage: f64,
    pub baseline: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauDuration {
    pub duration: f64,
    pub start: f64,
    pub end: f64,
    pub plateau: Plateau,
}

/// Strict interior local maxima above `threshold`.
///
/// The first and last samples are never spikes.
pub fn spike_times(series: &TimeSeries<'_>, threshold: f64) -> Spikes {
    let trace = series.samples();
    let mut spikes = Spikes::default();
    if trace.len() < 3 {
        return spikes;
    }
    for i in 1..trace.len() - 1 {
        let v = trace[i];
        if v > threshold && v > trace[i - 1] && v > trace[i + 1] {
            spikes.indices.push(i);
            spikes.times.push(series.time_at(i));
        }
    }
    spikes
}

pub fn num_spikes(series: &TimeSeries<'_>, threshold: f64) -> usize {
    spike_times(series, threshold).len()
}

/// Firing rate between the first and last spike, in Hz for times in ms.
///
/// Uses `n - 1` intervals over the first-to-last span, not count/duration.
pub fn frequency_of(times: &[f64]) -> f64 {
    match (times.first(), times.last()) {
        (Some(&first), Some(&last)) if times.len() > 1 => {
            1000.0 * (times.len() - 1) as f64 / (last - first)
        }
        _ => 0.0,
    }
}

pub fn spike_frequency(series: &TimeSeries<'_>, threshold: f64) -> f64 {
    frequency_of(&spike_times(series, threshold).times)
}

/// Time of the first spike relative to `syn_time`, 0 without spikes.
///
/// The first spike of the whole trace is used, so a spike before the
/// stimulus gives a negative value.
pub fn time_to_first_spike(series: &TimeSeries<'_>, threshold: f64, syn_time: f64) -> f64 {
    spike_times(series, threshold)
        .times
        .first()
        .map_or(0.0, |&t| t - syn_time)
}

pub fn first_interspike_interval(series: &TimeSeries<'_>, threshold: f64) -> f64 {
    match spike_times(series, threshold).times[..] {
        [first, second, ..] => second - first,
        _ => 0.0,
    }
}

/// Remove every sample within `floor((spike_width / recstep) / 2)` indices
/// (inclusive) of a detected spike peak.
pub fn clip_spikes(series: &TimeSeries<'_>, spike_width: f64, threshold: f64) -> Clipped {
    let spikes = spike_times(series, threshold);
    let radius = ((spike_width / series.recstep()) / 2.0).floor().max(0.0) as usize;

    let mut keep = vec![true; series.len()];
    for &peak in &spikes.indices {
        let end = peak.saturating_add(radius).min(series.len() - 1);
        for flag in &mut keep[peak.saturating_sub(radius)..=end] {
            *flag = false;
        }
    }

    let mut clipped = Clipped::default();
    for (i, &sample) in series.samples().iter().enumerate() {
        if keep[i] {
            clipped.samples.push(sample);
            clipped.times.push(series.time_at(i));
        }
    }
    clipped
}

/// Plateau amplitude following stimulus onset.
///
/// Fewer than two post-stimulus samples above `baseline +
/// plateau_threshold` means no plateau: amplitude and voltage are 0.
/// Otherwise the plateau voltage is the spike-clipped mean of
/// `[first_above, last_above)`.
pub fn plateau_amplitude(
    series: &TimeSeries<'_>,
    config: &MeasureConfig,
) -> Result<Plateau, MeasureError> {
    let syn_index = series.index_at(config.syn_time) - 1;
    let baseline = baseline(series, syn_index, config)?;
    let level = baseline + config.plateau_threshold;

    let mut above = post_stimulus(series, syn_index).filter(|&(_, v)| v > level);
    let first = above.next().map(|(i, _)| i);
    let last = above.last().map(|(i, _)| i);

    let (Some(first), Some(last)) = (first, last) else {
        return Ok(Plateau {
            amplitude: 0.0,
            voltage: 0.0,
            baseline,
        });
    };

    let window = series.slice(first..last);
    let voltage = clipped_mean(&window, config).unwrap_or(0.0);
    let amplitude = voltage - baseline;
    if amplitude < 0.0 {
        tracing::warn!(amplitude, baseline, voltage, "negative plateau amplitude");
    }

    Ok(Plateau {
        amplitude,
        voltage,
        baseline,
    })
}

/// Time spent above half the plateau amplitude after stimulus onset.
///
/// A post-stimulus sample is in the plateau when it exceeds
/// `voltage - amplitude / 2`. Duration is the span between the first and
/// last such sample; all zeros when none qualifies.
pub fn plateau_duration(
    series: &TimeSeries<'_>,
    config: &MeasureConfig,
) -> Result<PlateauDuration, MeasureError> {
    let plateau = plateau_amplitude(series, config)?;
    let level = plateau.voltage - plateau.amplitude / 2.0;
    let syn_index = series.index_at(config.syn_time) - 1;

    let span = post_stimulus(series, syn_index)
        .filter(|&(_, v)| v > level)
        .map(|(i, _)| series.time_at(i))
        .fold(None, |span: Option<(f64, f64)>, t| match span {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        });

    let (start, end) = span.unwrap_or((0.0, 0.0));
    Ok(PlateauDuration {
        duration: end - start,
        start,
        end,
        plateau,
    })
}

/// Peak depolarisation of a back-propagating action potential:
/// `max(trace[stimIndex..]) - trace[stimIndex - 1]`.
pub fn backprop_amplitude(series: &TimeSeries<'_>, stim_time: f64) -> Result<f64, MeasureError> {
    let stim_index = series.index_at(stim_time);
    if stim_index < 1 || stim_index as usize >= series.len() {
        return Err(MeasureError::StimulusOutOfRange {
            index: stim_index,
            len: series.len(),
        });
    }
    let stim_index = stim_index as usize;
    let trace = series.samples();
    let peak = trace[stim_index..]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(peak - trace[stim_index - 1])
}

fn baseline(
    series: &TimeSeries<'_>,
    syn_index: isize,
    config: &MeasureConfig,
) -> Result<f64, MeasureError> {
    let start = series.index_at(config.stable_time).max(0) as usize;
    let end = syn_index.max(0) as usize;
    let window = series.slice(start..end);
    clipped_mean(&window, config).ok_or(MeasureError::EmptyBaseline {
        start: start.min(series.len()),
        end: end.min(series.len()),
    })
}

/// Samples strictly after `syn_index`, with their indices
fn post_stimulus<'s>(
    series: &'s TimeSeries<'_>,
    syn_index: isize,
) -> impl Iterator<Item = (usize, f64)> + 's {
    let start = (syn_index + 1).max(0) as usize;
    series
        .samples()
        .iter()
        .copied()
        .enumerate()
        .skip(start)
}

fn clipped_mean(window: &TimeSeries<'_>, config: &MeasureConfig) -> Option<f64> {
    let clipped = clip_spikes(window, config.spike_width, config.spike_threshold);
    mean(&clipped.samples).or_else(|| mean(window.samples()))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(samples: &[f64], recstep: f64) -> TimeSeries<'_> {
        TimeSeries::new(samples, recstep).unwrap()
    }

    #[test]
    fn test_spike_times_interior_maxima() {
        let trace = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 10.0, 0.0, 0.0];
        let spikes = spike_times(&series(&trace, 1.0), 1.0);
        assert_eq!(spikes.indices, vec![3, 6]);
        assert_eq!(spikes.times, vec![3.0, 6.0]);
    }

    #[test]
    fn test_boundary_samples_never_spike() {
        let trace = [10.0, 0.0, 0.0];
        assert_eq!(num_spikes(&series(&trace, 1.0), -100.0), 0);
        assert_eq!(num_spikes(&series(&[0.0, 0.0, 10.0], 1.0), -100.0), 0);
        assert_eq!(num_spikes(&series(&[5.0, 6.0], 1.0), -100.0), 0);
    }

    #[test]
    fn test_plateaus_and_threshold_are_strict() {
        // Flat tops are not strict maxima, and the threshold is exclusive
        let trace = [0.0, 5.0, 5.0, 0.0, 3.0, 0.0];
        assert_eq!(spike_times(&series(&trace, 1.0), 1.0).indices, vec![4]);
        assert!(spike_times(&series(&trace, 1.0), 3.0).is_empty());
    }

    #[test]
    fn test_spike_frequency_uses_first_to_last_span() {
        let freq = frequency_of(&[10.0, 20.0, 40.0]);
        assert!((freq - 1000.0 * 2.0 / 30.0).abs() < 1e-9);
        assert!((freq - 66.6667).abs() < 1e-3);
        assert_eq!(frequency_of(&[10.0]), 0.0);
        assert_eq!(frequency_of(&[]), 0.0);

        let mut trace = vec![0.0; 50];
        trace[10] = 10.0;
        trace[20] = 10.0;
        trace[40] = 10.0;
        let s = series(&trace, 1.0);
        assert!((spike_frequency(&s, 1.0) - freq).abs() < 1e-9);
        assert_eq!(first_interspike_interval(&s, 1.0), 10.0);
        assert_eq!(time_to_first_spike(&s, 1.0, 4.0), 6.0);
        assert_eq!(time_to_first_spike(&s, 1.0, 15.0), -5.0);
    }

    #[test]
    fn test_latency_measures_without_spikes() {
        let trace = [0.0; 10];
        let s = series(&trace, 0.1);
        assert_eq!(spike_frequency(&s, -20.0), 0.0);
        assert_eq!(time_to_first_spike(&s, -20.0, 200.0), 0.0);
        assert_eq!(first_interspike_interval(&s, -20.0), 0.0);
    }

    #[test]
    fn test_clip_spikes_excises_radius() {
        let trace = [0.0, 1.0, 2.0, 3.0, 10.0, 3.0, 2.0, 1.0, 0.0];
        // width 4 at recstep 1 -> radius 2
        let clipped = clip_spikes(&series(&trace, 1.0), 4.0, 5.0);
        assert_eq!(clipped.samples, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(clipped.times, vec![0.0, 1.0, 7.0, 8.0]);

        let untouched = clip_spikes(&series(&trace, 1.0), 4.0, 50.0);
        assert_eq!(untouched.samples, trace.to_vec());
    }

    #[test]
    fn test_clip_spikes_radius_clamped_at_edges() {
        let trace = [0.0, 10.0, 0.0, 0.0, 0.0];
        let clipped = clip_spikes(&series(&trace, 0.5), 3.0, 5.0);
        // radius floor((3 / 0.5) / 2) = 3 removes indices 0..=4
        assert!(clipped.samples.is_empty());
    }

    fn step_trace(base: f64, plateau: f64, on: usize, off: usize, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if i >= on && i < off { plateau } else { base })
            .collect()
    }

    fn unit_config() -> MeasureConfig {
        MeasureConfig {
            recstep: 1.0,
            spike_threshold: 100.0,
            spike_width: 1.0,
            plateau_threshold: 5.0,
            stable_time: 2.0,
            syn_time: 10.0,
        }
    }

    #[test]
    fn test_plateau_amplitude_step() {
        let trace = step_trace(-70.0, -40.0, 12, 20, 30);
        let plateau = plateau_amplitude(&series(&trace, 1.0), &unit_config()).unwrap();
        assert_eq!(plateau.baseline, -70.0);
        assert_eq!(plateau.voltage, -40.0);
        assert_eq!(plateau.amplitude, 30.0);
    }

    #[test]
    fn test_plateau_amplitude_needs_two_samples_above() {
        let mut trace = vec![-70.0; 30];
        trace[15] = -50.0;
        let plateau = plateau_amplitude(&series(&trace, 1.0), &unit_config()).unwrap();
        assert_eq!(plateau.amplitude, 0.0);
        assert_eq!(plateau.voltage, 0.0);
        assert_eq!(plateau.baseline, -70.0);
    }

    #[test]
    fn test_plateau_ignores_pre_stimulus_excursions() {
        let mut trace = vec![-70.0; 30];
        // synIndex = 9, so index 9 and earlier never count
        trace[8] = -10.0;
        trace[9] = -10.0;
        let config = MeasureConfig {
            stable_time: 0.0,
            ..unit_config()
        };
        let plateau = plateau_amplitude(&series(&trace, 1.0), &config).unwrap();
        assert_eq!(plateau.amplitude, 0.0);
    }

    #[test]
    fn test_plateau_below_baseline_is_reported() {
        // Two crossings frame a hyperpolarised window: [12, 18) averages -85
        let mut trace = vec![-70.0; 30];
        trace[12] = -60.0;
        for v in &mut trace[13..18] {
            *v = -90.0;
        }
        trace[18] = -60.0;
        let plateau = plateau_amplitude(&series(&trace, 1.0), &unit_config()).unwrap();
        assert_eq!(plateau.baseline, -70.0);
        assert_eq!(plateau.voltage, -85.0);
        assert_eq!(plateau.amplitude, -15.0);
    }

    #[test]
    fn test_plateau_means_exclude_spikes() {
        let mut trace = step_trace(-70.0, -40.0, 12, 20, 30);
        trace[5] = 20.0;
        trace[15] = 10.0;
        // radius 1 removes 4..=6 from the baseline and 14..=16 from the plateau
        let config = MeasureConfig {
            spike_threshold: 0.0,
            spike_width: 2.0,
            ..unit_config()
        };
        let plateau = plateau_amplitude(&series(&trace, 1.0), &config).unwrap();
        assert_eq!(plateau.baseline, -70.0);
        assert_eq!(plateau.voltage, -40.0);
        assert_eq!(plateau.amplitude, 30.0);

        let unclipped = plateau_amplitude(&series(&trace, 1.0), &unit_config()).unwrap();
        assert!(unclipped.baseline > -70.0);
        assert!(unclipped.voltage > -40.0);
    }

    #[test]
    fn test_plateau_baseline_falls_back_when_clipping_removes_everything() {
        let mut trace = vec![-70.0; 30];
        trace[5] = -50.0;
        // Baseline window is 2..9; radius 4 around index 5 covers all of it
        let config = MeasureConfig {
            spike_threshold: -60.0,
            spike_width: 8.0,
            ..unit_config()
        };
        let plateau = plateau_amplitude(&series(&trace, 1.0), &config).unwrap();
        assert!((plateau.baseline - (-470.0 / 7.0)).abs() < 1e-9);
        assert_eq!(plateau.amplitude, 0.0);
    }

    #[test]
    fn test_plateau_empty_baseline_window() {
        let trace = vec![-70.0; 30];
        let config = MeasureConfig {
            stable_time: 20.0,
            ..unit_config()
        };
        assert_eq!(
            plateau_amplitude(&series(&trace, 1.0), &config),
            Err(MeasureError::EmptyBaseline { start: 20, end: 9 })
        );
    }

    #[test]
    fn test_plateau_duration_step() {
        let trace = step_trace(-70.0, -40.0, 12, 20, 30);
        let result = plateau_duration(&series(&trace, 1.0), &unit_config()).unwrap();
        assert_eq!(result.start, 12.0);
        assert_eq!(result.end, 19.0);
        assert_eq!(result.duration, 7.0);
        assert_eq!(result.plateau.amplitude, 30.0);
    }

    #[test]
    fn test_plateau_duration_none_qualifies() {
        let trace = vec![-70.0; 30];
        let result = plateau_duration(&series(&trace, 1.0), &unit_config()).unwrap();
        assert_eq!((result.duration, result.start, result.end), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_backprop_amplitude() {
        let trace = [-70.0, -70.0, -65.0, -20.0, -60.0];
        let s = series(&trace, 1.0);
        assert_eq!(backprop_amplitude(&s, 2.0).unwrap(), 50.0);
        assert!(matches!(
            backprop_amplitude(&s, 0.0),
            Err(MeasureError::StimulusOutOfRange { index: 0, len: 5 })
        ));
        assert!(backprop_amplitude(&s, 9.0).is_err());
    }
}
