//! Canonical string keys for grid combinations.
//!
//! A key is an underscore followed by the zero-based index for each axis,
//! in declaration order: combination `(3, 1)` of a 2-axis grid is `"_3_1"`.
//! The simulation runner names its output files `<batch><key>.json`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::model::ParameterGrid;

/// Deserializing rejects non-canonical keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CombinationKey(String);

impl CombinationKey {
    /// Build the key for an index tuple
    pub fn encode(indices: &[usize]) -> Self {
        let mut key = String::with_capacity(indices.len() * 3);
        for index in indices {
            key.push('_');
            key.push_str(&index.to_string());
        }
        Self(key)
    }

    /// Parse a key that is expected to be canonical.
    ///
    /// Rejects anything `encode` would not produce (leading zeros, signs,
    /// empty segments) so that decoding stays an exact inverse.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        Self::try_from(s.to_string())
    }

    /// Recover the index tuple
    pub fn decode(&self) -> Result<Vec<usize>, KeyError> {
        let malformed = || KeyError::Malformed(self.0.clone());
        let rest = self.0.strip_prefix('_').ok_or_else(malformed)?;
        rest.split('_')
            .map(|segment| {
                let canonical = !segment.is_empty()
                    && segment.bytes().all(|b| b.is_ascii_digit())
                    && (segment == "0" || !segment.starts_with('0'));
                if !canonical {
                    return Err(malformed());
                }
                segment.parse::<usize>().map_err(|_| malformed())
            })
            .collect()
    }

    /// Decode and check the tuple against a grid's shape
    pub fn decode_for(&self, grid: &ParameterGrid) -> Result<Vec<usize>, KeyError> {
        let indices = self.decode()?;
        let shape = grid.shape();
        if indices.len() != shape.len() {
            return Err(KeyError::WrongArity {
                expected: shape.len(),
                found: indices.len(),
            });
        }
        for (axis, (&index, &len)) in indices.iter().zip(&shape).enumerate() {
            if index >= len {
                return Err(KeyError::IndexOutOfRange { axis, index, len });
            }
        }
        Ok(indices)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CombinationKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let key = Self(s);
        key.decode()?;
        Ok(key)
    }
}

impl From<CombinationKey> for String {
    fn from(key: CombinationKey) -> Self {
        key.0
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
