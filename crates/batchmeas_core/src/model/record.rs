//! Per-combination output records and the result set built from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, RecordError};
use crate::model::{CellId, CombinationKey, ParamValue};

/// Record field holding recorded traces and spike trains
pub const SIM_DATA: &str = "simData";
/// Record field holding the network description
pub const NETWORK: &str = "net";
/// Reserved name of the parameter value tuple attached to every record
pub const PARAM_VALUES: &str = "paramValues";
const SPIKE_TIMES: &str = "spkt";
const SPIKE_IDS: &str = "spkid";

/// Data stored under one field of an output record.
///
/// Variants are tried in order when parsing, so a mapping whose values are
/// all numeric arrays becomes `PerCell`, and anything that is not numeric
/// (network metadata, strings, lists of objects) ends up `Opaque`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldData {
    Scalar(f64),
    Series(Vec<f64>),
    PerCell(BTreeMap<String, Vec<f64>>),
    Nested(BTreeMap<String, FieldData>),
    Opaque(serde_json::Value),
}

impl FieldData {
    /// Series stored directly under `name` in a mapping
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        match self {
            FieldData::PerCell(map) => map.get(name).map(Vec::as_slice),
            FieldData::Nested(map) => match map.get(name) {
                Some(FieldData::Series(values)) => Some(values),
                _ => None,
            },
            _ => None,
        }
    }

    /// Sub-field stored under `name` in a nested mapping
    pub fn child(&self, name: &str) -> Option<&FieldData> {
        match self {
            FieldData::Nested(map) => map.get(name),
            _ => None,
        }
    }

    fn has_member(&self, name: &str) -> bool {
        match self {
            FieldData::PerCell(map) => map.contains_key(name),
            FieldData::Nested(map) => map.contains_key(name),
            _ => false,
        }
    }
}

/// The closed set of record fields the analysis reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceField {
    /// Membrane potential of a section, stored as `V_<section>`
    Voltage { section: String },
    /// Any other per-cell trace, by its recorded name
    Named(String),
    /// Spike times of all cells
    SpikeTimes,
    /// Cell id of each entry in `SpikeTimes`
    SpikeIds,
}

impl TraceField {
    pub fn soma() -> Self {
        TraceField::Voltage {
            section: "soma".to_string(),
        }
    }

    /// Name of the entry inside `simData`
    pub fn field_name(&self) -> String {
        match self {
            TraceField::Voltage { section } => format!("V_{section}"),
            TraceField::Named(name) => name.clone(),
            TraceField::SpikeTimes => SPIKE_TIMES.to_string(),
            TraceField::SpikeIds => SPIKE_IDS.to_string(),
        }
    }

    /// Whether the field is stored per cell
    pub fn is_per_cell(&self) -> bool {
        matches!(self, TraceField::Voltage { .. } | TraceField::Named(_))
    }
}

impl fmt::Display for TraceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field_name())
    }
}

impl FromStr for TraceField {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(RecordError::MissingField(String::new())),
            SPIKE_TIMES => Ok(TraceField::SpikeTimes),
            SPIKE_IDS => Ok(TraceField::SpikeIds),
            _ => match s.strip_prefix("V_") {
                Some(section) if !section.is_empty() => Ok(TraceField::Voltage {
                    section: section.to_string(),
                }),
                _ => Ok(TraceField::Named(s.to_string())),
            },
        }
    }
}

/// Network description attached to every output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetadata {
    pub cells: Vec<CellMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    pub gid: u64,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl NetworkMetadata {
    /// Verify that the cell declared at position `cell` carries gid `cell`.
    ///
    /// `key` names the record the network came from.
    pub fn check_cell(&self, key: &CombinationKey, cell: CellId) -> Result<(), ConsistencyError> {
        let declared = self
            .cells
            .get(cell.0)
            .ok_or_else(|| ConsistencyError::UnknownCell {
                key: key.clone(),
                cell,
                num_cells: self.cells.len(),
            })?;
        if declared.gid != cell.0 as u64 {
            return Err(ConsistencyError::CellMismatch {
                key: key.clone(),
                cell,
                gid: declared.gid,
            });
        }
        Ok(())
    }

    /// The `cellType` tag of a cell, if declared
    pub fn cell_type(&self, cell: CellId) -> Option<String> {
        let tag = self.cells.get(cell.0)?.tags.get("cellType")?;
        Some(match tag {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Output of one simulated combination.
///
/// Serialized flat: `paramValues` next to the record's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Parameter values (not indices) that produced this record
    #[serde(rename = "paramValues")]
    pub param_values: Vec<ParamValue>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldData>,
}

impl ResultRecord {
    /// A `paramValues` entry among `fields` is dropped in favor of
    /// `param_values`.
    pub fn new(param_values: Vec<ParamValue>, mut fields: BTreeMap<String, FieldData>) -> Self {
        fields.remove(PARAM_VALUES);
        Self {
            param_values,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Result<&FieldData, RecordError> {
        self.fields
            .get(name)
            .ok_or_else(|| RecordError::MissingField(name.to_string()))
    }

    /// Look up a recorded series.
    ///
    /// Per-cell fields are resolved for `cell`; spike trains ignore it.
    pub fn trace(&self, field: &TraceField, cell: CellId) -> Result<&[f64], RecordError> {
        let sim = self.field(SIM_DATA)?;
        let name = field.field_name();

        if !field.is_per_cell() {
            return sim.series(&name).ok_or_else(|| missing_member(sim, &name));
        }

        let per_cell = sim.child(&name).ok_or_else(|| missing_member(sim, &name))?;
        let label = cell.label();
        per_cell.series(&label).ok_or_else(|| {
            if per_cell.has_member(&label) {
                RecordError::WrongShape {
                    field: format!("{name}.{label}"),
                    expected: "a numeric series",
                }
            } else {
                RecordError::MissingCell { field: name, cell: label }
            }
        })
    }

    /// Recorded spike times of one cell, in recorded order
    pub fn spike_train(&self, cell: CellId) -> Result<Vec<f64>, RecordError> {
        let times = self.trace(&TraceField::SpikeTimes, cell)?;
        let ids = self.trace(&TraceField::SpikeIds, cell)?;
        if times.len() != ids.len() {
            return Err(RecordError::WrongShape {
                field: SPIKE_IDS.to_string(),
                expected: "as long as the spike times",
            });
        }
        let id = cell.0 as f64;
        Ok(times
            .iter()
            .zip(ids)
            .filter(|&(_, &spike_id)| spike_id == id)
            .map(|(&t, _)| t)
            .collect())
    }

    /// Parse the network description
    pub fn network(&self) -> Result<NetworkMetadata, RecordError> {
        let raw = self.field(NETWORK)?;
        serde_json::to_value(raw)
            .and_then(serde_json::from_value)
            .map_err(|e| RecordError::Parse(format!("network metadata: {e}")))
    }
}

fn missing_member(parent: &FieldData, name: &str) -> RecordError {
    if parent.has_member(name) {
        RecordError::WrongShape {
            field: name.to_string(),
            expected: "the expected shape",
        }
    } else {
        RecordError::MissingField(format!("{SIM_DATA}.{name}"))
    }
}

/// Records keyed by combination. May hold only a subset of the grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: BTreeMap<CombinationKey, ResultRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: CombinationKey, record: ResultRecord) {
        self.records.insert(key, record);
    }

    pub fn get(&self, key: &CombinationKey) -> Option<&ResultRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &CombinationKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the smallest key, used for network consistency checks
    pub fn first(&self) -> Option<(&CombinationKey, &ResultRecord)> {
        self.records.iter().next()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CombinationKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CombinationKey, &ResultRecord)> {
        self.records.iter()
    }
}

impl FromIterator<(CombinationKey, ResultRecord)> for ResultSet {
    fn from_iter<I: IntoIterator<Item = (CombinationKey, ResultRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
