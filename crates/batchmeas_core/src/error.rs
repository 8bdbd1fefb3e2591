use std::fmt;

use crate::model::{CellId, CombinationKey, ParamValue};

/// Errors raised while building or validating a parameter grid.
///
/// These are configuration errors: they are reported at call time, before
/// any record is read.
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    NoAxes,
    EmptyAxis(String),
    DuplicateLabel(String),
    MultipleGrouped(Vec<String>),
    /// Operation supports a limited number of output axes
    UnsupportedAxisCount {
        found: usize,
        max: usize,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::NoAxes => write!(f, "parameter grid has no axes"),
            GridError::EmptyAxis(label) => write!(f, "parameter axis '{label}' has no values"),
            GridError::DuplicateLabel(label) => {
                write!(f, "parameter axis label '{label}' is declared more than once")
            }
            GridError::MultipleGrouped(labels) => write!(
                f,
                "at most one axis may be grouped, found {}: {}",
                labels.len(),
                labels.join(", ")
            ),
            GridError::UnsupportedAxisCount { found, max } => write!(
                f,
                "operation supports 1 to {max} output axes, grid has {found}"
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Errors decoding a combination key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyError {
    Malformed(String),
    WrongArity { expected: usize, found: usize },
    IndexOutOfRange { axis: usize, index: usize, len: usize },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Malformed(key) => write!(f, "malformed combination key '{key}'"),
            KeyError::WrongArity { expected, found } => {
                write!(f, "combination key has {found} indices, grid has {expected} axes")
            }
            KeyError::IndexOutOfRange { axis, index, len } => {
                write!(f, "index {index} out of range for axis {axis} ({len} values)")
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors reading or interpreting a single output record.
///
/// During collection every variant counts as a missing combination.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    Io(String),
    Parse(String),
    MissingField(String),
    MissingCell { field: String, cell: String },
    WrongShape { field: String, expected: &'static str },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Io(msg) => write!(f, "IO error: {msg}"),
            RecordError::Parse(msg) => write!(f, "parse error: {msg}"),
            RecordError::MissingField(field) => write!(f, "field '{field}' not found"),
            RecordError::MissingCell { field, cell } => {
                write!(f, "field '{field}' has no entry for {cell}")
            }
            RecordError::WrongShape { field, expected } => {
                write!(f, "field '{field}' is not {expected}")
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Mismatch between the records and the grid or network they claim to
/// come from. Always fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    MissingNetwork {
        key: CombinationKey,
        reason: String,
    },
    UnknownCell {
        key: CombinationKey,
        cell: CellId,
        num_cells: usize,
    },
    CellMismatch {
        key: CombinationKey,
        cell: CellId,
        gid: u64,
    },
    WrongArity {
        key: CombinationKey,
        expected: usize,
        found: usize,
    },
    ValueNotInAxis {
        key: CombinationKey,
        axis: String,
        value: ParamValue,
    },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyError::MissingNetwork { key, reason } => {
                write!(f, "record {key} has no usable network metadata: {reason}")
            }
            ConsistencyError::UnknownCell {
                key,
                cell,
                num_cells,
            } => write!(
                f,
                "record {key}: cell {} not declared by the network ({num_cells} cells)",
                cell.0
            ),
            ConsistencyError::CellMismatch { key, cell, gid } => write!(
                f,
                "record {key}: cell {} is declared at position {} with gid {gid}",
                cell.0, cell.0
            ),
            ConsistencyError::WrongArity {
                key,
                expected,
                found,
            } => write!(
                f,
                "record {key} has {found} parameter values, grid has {expected} axes"
            ),
            ConsistencyError::ValueNotInAxis { key, axis, value } => write!(
                f,
                "record {key}: value {value} is not declared on axis '{axis}'"
            ),
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Errors from the trace measurement functions
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureError {
    /// The pre-stimulus window `[start, end)` holds no samples
    EmptyBaseline { start: usize, end: usize },
    TimeLengthMismatch { samples: usize, times: usize },
    InvalidRecstep(f64),
    /// A marker time falls outside the recorded samples
    StimulusOutOfRange { index: isize, len: usize },
    /// The measurement reads a recorded spike train, not a voltage trace
    NeedsSpikeTrain(String),
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureError::EmptyBaseline { start, end } => {
                write!(f, "baseline window [{start}, {end}) contains no samples")
            }
            MeasureError::TimeLengthMismatch { samples, times } => {
                write!(f, "trace has {samples} samples but {times} time points")
            }
            MeasureError::InvalidRecstep(step) => {
                write!(f, "sampling interval must be positive and finite, got {step}")
            }
            MeasureError::StimulusOutOfRange { index, len } => {
                write!(f, "stimulus index {index} outside trace of {len} samples")
            }
            MeasureError::NeedsSpikeTrain(name) => {
                write!(f, "measurement '{name}' needs a recorded spike train")
            }
        }
    }
}

impl std::error::Error for MeasureError {}

/// Errors related to the aggregate file and other persisted artifacts
#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "IO error: {msg}"),
            StoreError::Parse(msg) => write!(f, "parse error: {msg}"),
            StoreError::Serialize(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors mapping a measurement (or trace extraction) across a result set
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    Config(GridError),
    Consistency(ConsistencyError),
    Record {
        key: CombinationKey,
        source: RecordError,
    },
    Measure {
        key: CombinationKey,
        source: MeasureError,
    },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::Config(e) => write!(f, "{e}"),
            MappingError::Consistency(e) => write!(f, "{e}"),
            MappingError::Record { key, source } => write!(f, "record {key}: {source}"),
            MappingError::Measure { key, source } => {
                write!(f, "measurement failed for record {key}: {source}")
            }
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MappingError::Config(e) => Some(e),
            MappingError::Consistency(e) => Some(e),
            MappingError::Record { source, .. } => Some(source),
            MappingError::Measure { source, .. } => Some(source),
        }
    }
}

impl From<GridError> for MappingError {
    fn from(err: GridError) -> Self {
        MappingError::Config(err)
    }
}

impl From<ConsistencyError> for MappingError {
    fn from(err: ConsistencyError) -> Self {
        MappingError::Consistency(err)
    }
}
