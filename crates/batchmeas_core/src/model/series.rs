//! Borrowed view of a uniformly sampled trace.

use std::ops::Range;

use crate::error::MeasureError;

/// Samples taken every `recstep` ms, optionally with an explicit time vector.
///
/// Without a time vector, sample `i` sits at `i * recstep`. Slicing keeps
/// absolute times, so sample `0` of `series.slice(10..20)` is still at
/// `10 * recstep`.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeries<'a> {
    samples: &'a [f64],
    time: Option<&'a [f64]>,
    recstep: f64,
    offset: usize,
}

impl<'a> TimeSeries<'a> {
    pub fn new(samples: &'a [f64], recstep: f64) -> Result<Self, MeasureError> {
        if !(recstep.is_finite() && recstep > 0.0) {
            return Err(MeasureError::InvalidRecstep(recstep));
        }
        Ok(Self {
            samples,
            time: None,
            recstep,
            offset: 0,
        })
    }

    /// Attach an explicit time vector, which must match the samples in length
    pub fn with_time(
        samples: &'a [f64],
        time: &'a [f64],
        recstep: f64,
    ) -> Result<Self, MeasureError> {
        if samples.len() != time.len() {
            return Err(MeasureError::TimeLengthMismatch {
                samples: samples.len(),
                times: time.len(),
            });
        }
        let mut series = Self::new(samples, recstep)?;
        series.time = Some(time);
        Ok(series)
    }

    pub fn samples(&self) -> &'a [f64] {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn recstep(&self) -> f64 {
        self.recstep
    }

    /// Time of sample `i` (ms)
    pub fn time_at(&self, i: usize) -> f64 {
        match self.time {
            Some(time) => time[i],
            None => (self.offset + i) as f64 * self.recstep,
        }
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.time_at(i)).collect()
    }

    /// Sample index for a time, `floor(t / recstep)`.
    ///
    /// Negative results are possible and meaningful for the callers that
    /// step one sample back from a marker time.
    pub fn index_at(&self, t: f64) -> isize {
        (t / self.recstep).floor() as isize
    }

    /// Half-open sub-range, clamped to the series
    pub fn slice(&self, range: Range<usize>) -> TimeSeries<'a> {
        let start = range.start.min(self.len());
        let end = range.end.clamp(start, self.len());
        TimeSeries {
            samples: &self.samples[start..end],
            time: self.time.map(|t| &t[start..end]),
            recstep: self.recstep,
            offset: self.offset + start,
        }
    }
}
