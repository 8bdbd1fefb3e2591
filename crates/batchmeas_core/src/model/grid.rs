//! Parameter axes, grids and their Cartesian-product enumeration.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// A single swept parameter value.
///
/// Integers and floats are interchangeable: `Int(1)` and `Float(1.0)` are
/// equal and hash identically, since output records may write either form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric value, if this is an integer or a float
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => false,
            },
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ParamValue::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            ParamValue::Text(s) => {
                state.write_u8(2);
                s.hash(state);
            }
            ParamValue::Int(_) | ParamValue::Float(_) => {
                let x = self.as_f64().unwrap_or(f64::NAN);
                // +0.0 and -0.0 compare equal, so they must hash equal too
                let bits = if x == 0.0 {
                    0u64
                } else if x.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    x.to_bits()
                };
                state.write_u8(0);
                bits.hash(state);
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

/// One swept parameter: a label and its ordered values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAxis {
    pub label: String,
    pub values: Vec<ParamValue>,
    /// Written as `group`, the name batch description files use
    #[serde(default, rename = "group", alias = "grouped")]
    pub grouped: bool,
}

impl ParameterAxis {
    pub fn new<V: Into<ParamValue>>(label: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            label: label.into(),
            values: values.into_iter().map(Into::into).collect(),
            grouped: false,
        }
    }

    /// Mark this axis as the grid's shared grouped axis
    #[must_use]
    pub fn grouped(mut self) -> Self {
        self.grouped = true;
        self
    }

    /// Evenly spaced float values from `min` to `max` inclusive
    pub fn linspace(label: impl Into<String>, min: f64, max: f64, count: usize) -> Self {
        let values = if count <= 1 {
            vec![min]
        } else {
            let step = (max - min) / (count - 1) as f64;
            (0..count).map(|i| min + step * i as f64).collect()
        };
        Self::new(label, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered, validated collection of parameter axes.
///
/// Serializes as the plain list of axes; deserialization re-validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParameterAxis>", into = "Vec<ParameterAxis>")]
pub struct ParameterGrid {
    axes: Vec<ParameterAxis>,
    /// Per-axis value -> index lookup, first occurrence wins
    lookup: Vec<FxHashMap<ParamValue, usize>>,
}

impl ParameterGrid {
    /// Validate and build a grid.
    ///
    /// Requires at least one axis, non-empty values, unique labels and at
    /// most one grouped axis.
    pub fn new(axes: Vec<ParameterAxis>) -> Result<Self, GridError> {
        if axes.is_empty() {
            return Err(GridError::NoAxes);
        }
        for (i, axis) in axes.iter().enumerate() {
            if axis.is_empty() {
                return Err(GridError::EmptyAxis(axis.label.clone()));
            }
            if axes[..i].iter().any(|a| a.label == axis.label) {
                return Err(GridError::DuplicateLabel(axis.label.clone()));
            }
        }
        let grouped: Vec<String> = axes
            .iter()
            .filter(|a| a.grouped)
            .map(|a| a.label.clone())
            .collect();
        if grouped.len() > 1 {
            return Err(GridError::MultipleGrouped(grouped));
        }

        let lookup = axes
            .iter()
            .map(|axis| {
                let mut map = FxHashMap::default();
                for (i, value) in axis.values.iter().enumerate() {
                    map.entry(value.clone()).or_insert(i);
                }
                map
            })
            .collect();

        Ok(Self { axes, lookup })
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Number of values on each axis, in declaration order
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(ParameterAxis::len).collect()
    }

    /// Total number of combinations
    pub fn combination_count(&self) -> usize {
        self.axes.iter().map(ParameterAxis::len).product()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.label.as_str()).collect()
    }

    pub fn axis(&self, label: &str) -> Option<&ParameterAxis> {
        self.axes.iter().find(|a| a.label == label)
    }

    /// Position of the grouped axis, if any
    pub fn grouped_axis(&self) -> Option<usize> {
        self.axes.iter().position(|a| a.grouped)
    }

    /// Index of `value` within the declared values of axis `axis`
    pub fn index_of(&self, axis: usize, value: &ParamValue) -> Option<usize> {
        self.lookup.get(axis)?.get(value).copied()
    }

    /// Parameter values at the given index tuple
    pub fn values_at(&self, indices: &[usize]) -> Option<Vec<ParamValue>> {
        if indices.len() != self.axes.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.axes)
            .map(|(&i, axis)| axis.values.get(i).cloned())
            .collect()
    }

    /// Check that an operation limited to `max` output axes can use this grid.
    ///
    /// The grouped axis, if present, is the shared output axis and counts
    /// like any other.
    pub fn require_output_axes(&self, max: usize) -> Result<usize, GridError> {
        let found = self.axes.len();
        if found == 0 || found > max {
            return Err(GridError::UnsupportedAxisCount { found, max });
        }
        Ok(found)
    }

    /// Iterate over every combination, last-declared axis fastest
    pub fn combinations(&self) -> GridEnumeration<'_> {
        GridEnumeration {
            grid: self,
            current: vec![0; self.axes.len()],
            position: 0,
            done: self.combination_count() == 0,
        }
    }
}

impl PartialEq for ParameterGrid {
    fn eq(&self, other: &Self) -> bool {
        self.axes == other.axes
    }
}

impl TryFrom<Vec<ParameterAxis>> for ParameterGrid {
    type Error = GridError;

    fn try_from(axes: Vec<ParameterAxis>) -> Result<Self, Self::Error> {
        Self::new(axes)
    }
}

impl From<ParameterGrid> for Vec<ParameterAxis> {
    fn from(grid: ParameterGrid) -> Self {
        grid.axes
    }
}

/// Enumerate every combination of `grid` in canonical order
pub fn enumerate(grid: &ParameterGrid) -> GridEnumeration<'_> {
    grid.combinations()
}

/// One point of the Cartesian product
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    /// Position in enumeration order, starting at 0
    pub position: usize,
    pub indices: Vec<usize>,
    pub values: Vec<ParamValue>,
}

/// Iterator over all combinations of a grid in row-major order
pub struct GridEnumeration<'a> {
    grid: &'a ParameterGrid,
    current: Vec<usize>,
    position: usize,
    done: bool,
}

impl Iterator for GridEnumeration<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let indices = self.current.clone();
        let values = indices
            .iter()
            .zip(&self.grid.axes)
            .map(|(&i, axis)| axis.values[i].clone())
            .collect();
        let item = Combination {
            position: self.position,
            indices,
            values,
        };
        self.position += 1;

        // Row-major: last axis varies fastest
        for i in (0..self.current.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.grid.axes[i].len() {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
            }
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            self.grid.combination_count() - self.position
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridEnumeration<'_> {}
