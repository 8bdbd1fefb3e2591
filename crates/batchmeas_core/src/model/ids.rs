//! Identifiers for simulated entities

use serde::{Deserialize, Serialize};

/// Identifier (gid) of a simulated cell.
///
/// The network declares cells in gid order, so a valid id is also the
/// cell's position in the network metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub usize);

impl CellId {
    /// Label under which per-cell traces are stored in an output record
    pub fn label(&self) -> String {
        format!("cell_{}", self.0)
    }
}
