//! Assemble a result set from per-combination output records.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{RecordError, StoreError};
use crate::model::{
    Combination, CombinationKey, PARAM_VALUES, ParamValue, ParameterGrid, ResultRecord, ResultSet,
};
use crate::source::{RecordFields, RecordSource};

/// Restrictions applied during a collection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectOptions {
    /// Fields to keep from every record. Defaults to the fields of the first
    /// record read successfully.
    pub fields: Option<Vec<String>>,
    /// Combinations at enumeration position `>= max` are not attempted
    pub max_combinations: Option<usize>,
    /// Only combinations whose value tuple is listed are attempted
    pub only: Option<Vec<Vec<ParamValue>>>,
}

#[derive(Deserialize)]
struct MatchFile {
    #[serde(rename = "paramsMatch")]
    params_match: Vec<Vec<ParamValue>>,
}

impl CollectOptions {
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_max_combinations(mut self, max: usize) -> Self {
        self.max_combinations = Some(max);
        self
    }

    pub fn with_only(mut self, only: Vec<Vec<ParamValue>>) -> Self {
        self.only = Some(only);
        self
    }

    /// Read the value-tuple allow-list from the `paramsMatch` array of a
    /// JSON file
    pub fn only_from_file(self, path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", path.display())))?;
        let file: MatchFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Parse(format!("Failed to parse {}: {e}", path.display())))?;
        Ok(self.with_only(file.params_match))
    }
}

/// Outcome of a collection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub results: ResultSet,
    /// Combinations skipped or unreadable
    pub missing: usize,
}

/// Read the record of every combination of `grid` from `source`.
///
/// Never fails: skipped combinations and records that cannot be read, parsed
/// or that lack a requested field are counted in `missing`.
pub fn collect(grid: &ParameterGrid, source: &dyn RecordSource, options: &CollectOptions) -> Collection {
    let allowed: Option<FxHashSet<&[ParamValue]>> = options
        .only
        .as_ref()
        .map(|only| only.iter().map(Vec::as_slice).collect());
    let mut fields = options.fields.clone();
    let mut collection = Collection::default();

    for combination in grid.combinations() {
        if !admitted(&combination, options.max_combinations, allowed.as_ref()) {
            collection.missing += 1;
            continue;
        }

        let key = CombinationKey::encode(&combination.indices);
        match source
            .read(&key)
            .and_then(|raw| select_fields(raw, &mut fields))
        {
            Ok(selected) => {
                debug!(%key, "collected record");
                collection
                    .results
                    .insert(key, ResultRecord::new(combination.values, selected));
            }
            Err(e) => {
                debug!(%key, error = %e, "record missing");
                collection.missing += 1;
            }
        }
    }

    info!(
        collected = collection.results.len(),
        missing = collection.missing,
        total = grid.combination_count(),
        "collection finished"
    );
    collection
}

fn admitted(
    combination: &Combination,
    max: Option<usize>,
    allowed: Option<&FxHashSet<&[ParamValue]>>,
) -> bool {
    if max.is_some_and(|max| combination.position >= max) {
        return false;
    }
    allowed.is_none_or(|set| set.contains(combination.values.as_slice()))
}

/// Keep the requested fields, fixing the field list from the first record
/// when none was given.
///
/// A raw `paramValues` entry is never kept; the grid's value tuple replaces
/// it.
fn select_fields(
    mut raw: RecordFields,
    fields: &mut Option<Vec<String>>,
) -> Result<RecordFields, RecordError> {
    raw.remove(PARAM_VALUES);
    let wanted = fields.get_or_insert_with(|| raw.keys().cloned().collect());
    let mut selected = BTreeMap::new();
    for name in wanted.iter().filter(|name| *name != PARAM_VALUES) {
        let value = raw
            .remove(name)
            .ok_or_else(|| RecordError::MissingField(name.clone()))?;
        selected.insert(name.clone(), value);
    }
    Ok(selected)
}
