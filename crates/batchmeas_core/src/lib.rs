//! Batch aggregation and trace measurement for neuron parameter sweeps
//!
//! A sweep runs one simulation per point of a parameter grid; each run
//! leaves an output record on disk. This crate:
//! - Enumerates the grid and names every combination with a canonical key
//! - Collects the output records into a result set, counting the missing ones
//! - Saves and reloads the whole batch as a single aggregate file
//! - Measures voltage traces (spikes, plateau potentials, bAP amplitude)
//! - Maps a measurement across the batch onto a 1-D or 2-D array
//!
//! # Example
//!
//! ```ignore
//! use batchmeas_core::{BatchDirectory, CollectOptions, LoadMode, read_batch};
//! use batchmeas_core::analysis::{Measurement, MeasurementTarget, map_measurement};
//!
//! let dir = BatchDirectory::open(Path::new("batch_data"), "glutAmp");
//! let (grid, collection) = read_batch(&dir, &CollectOptions::default(), LoadMode::Scan)?;
//! let result = map_measurement(
//!     &grid,
//!     &collection.results,
//!     &MeasurementTarget::soma(CellId(0)),
//!     &Measurement::PlateauAmplitude,
//!     &MeasureConfig::default(),
//! )?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod collect;
pub mod error;
pub mod measure;
pub mod recording;
pub mod source;
pub mod store;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

mod util;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use collect::{CollectOptions, Collection, collect};
pub use error::{
    ConsistencyError, GridError, KeyError, MappingError, MeasureError, RecordError, StoreError,
};
pub use measure::MeasureConfig;
pub use model::{CellId, CombinationKey, ParamValue, ParameterAxis, ParameterGrid, ResultSet};
pub use recording::{Recording, RecordingAxis, RecordingUnits, measure_recording};
pub use source::{BatchDirectory, MemorySource, RecordSource, list_batches};
pub use store::{AggregateStore, LoadMode, ResultSetDiff, diff_result_sets, read_batch};
