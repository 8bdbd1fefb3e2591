//! Batch measurement mapping.
//!
//! Works on a [`ResultSet`](crate::model::ResultSet) that has already been
//! collected from disk (or reloaded from the aggregate file):
//!
//! ```ignore
//! use batchmeas_core::analysis::{Measurement, MeasurementTarget, map_all};
//!
//! let target = MeasurementTarget::soma(CellId(0));
//! let results = map_all(
//!     &grid,
//!     &collection.results,
//!     &target,
//!     &[Measurement::PlateauAmplitude, Measurement::NumSpikes],
//!     &MeasureConfig::default(),
//! )?;
//! ```
//!
//! Mapping fails with a [`ConsistencyError`](crate::error::ConsistencyError)
//! when the network metadata does not match the target cell or a record's
//! parameter values are not on the grid.
//!
//! # N-Dimensional Grid
//!
//! [`SweepGrid<T>`] stores per-point data with stride-based indexing. Mapped
//! measurements are limited to two output axes; [`extract_traces`] accepts
//! any number.

mod grid;
mod mapper;
mod metrics;
mod traces;

pub use grid::*;
pub use mapper::{MAX_OUTPUT_AXES, MeasurementTarget, map_all, map_measurement};
pub use metrics::*;
pub use traces::*;
