//! The aggregate file: a whole batch in one JSON document.
//!
//! Layout matches what earlier tooling wrote as `<label>_allData.json`:
//! `{"params": [axis, ...], "data": {"_0_0": {"paramValues": [...], ...}}}`.
//! Missing combinations are simply absent from `data`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collect::{CollectOptions, Collection, collect};
use crate::error::StoreError;
use crate::model::{CombinationKey, ParameterGrid, ResultSet};
use crate::source::BatchDirectory;
use crate::util::io::atomic_write;

#[derive(Serialize)]
struct AggregateRef<'a> {
    params: &'a ParameterGrid,
    data: &'a ResultSet,
}

#[derive(Deserialize)]
struct Aggregate {
    params: ParameterGrid,
    data: ResultSet,
}

/// Saves and reloads a grid together with its result set
#[derive(Debug, Clone)]
pub struct AggregateStore {
    path: PathBuf,
}

impl AggregateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, grid: &ParameterGrid, results: &ResultSet) -> Result<(), StoreError> {
        let json = serde_json::to_vec(&AggregateRef {
            params: grid,
            data: results,
        })
        .map_err(|e| StoreError::Serialize(format!("Failed to serialize aggregate: {e}")))?;

        atomic_write(&self.path, &json).map_err(|e| {
            StoreError::Io(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        info!(path = %self.path.display(), records = results.len(), "saved aggregate");
        Ok(())
    }

    pub fn load(&self) -> Result<(ParameterGrid, ResultSet), StoreError> {
        let content = fs::read(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", self.path.display())))?;
        let aggregate: Aggregate = serde_json::from_slice(&content).map_err(|e| {
            StoreError::Parse(format!("Failed to parse {}: {e}", self.path.display()))
        })?;
        Ok((aggregate.params, aggregate.data))
    }
}

/// How [`read_batch`] obtains its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Read every output record
    #[default]
    Scan,
    /// Read every output record, then write the aggregate file
    ScanAndSave,
    /// Reload the aggregate file written by an earlier scan
    LoadAggregate,
}

/// Grid and records of a batch directory.
///
/// When reloading the aggregate, `missing` counts the grid points absent
/// from it and `options` are not applied.
pub fn read_batch(
    dir: &BatchDirectory,
    options: &CollectOptions,
    mode: LoadMode,
) -> Result<(ParameterGrid, Collection), StoreError> {
    let store = AggregateStore::new(dir.aggregate_path());
    if mode == LoadMode::LoadAggregate {
        let (grid, results) = store.load()?;
        let missing = grid.combination_count().saturating_sub(results.len());
        return Ok((grid, Collection { results, missing }));
    }

    let grid = dir.read_grid()?;
    info!(batch = dir.label(), combinations = grid.combination_count(), "reading batch");
    let collection = collect(&grid, dir, options);
    if mode == LoadMode::ScanAndSave {
        store.save(&grid, &collection.results)?;
    }
    Ok((grid, collection))
}

/// Key-level differences between two result sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSetDiff {
    pub only_left: Vec<CombinationKey>,
    pub only_right: Vec<CombinationKey>,
    /// Keys present on both sides, with the names of the fields that differ
    pub changed: Vec<(CombinationKey, Vec<String>)>,
}

impl ResultSetDiff {
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty() && self.changed.is_empty()
    }
}

/// Compare two result sets record by record.
///
/// A difference in parameter values is reported as the field `paramValues`.
pub fn diff_result_sets(left: &ResultSet, right: &ResultSet) -> ResultSetDiff {
    let mut diff = ResultSetDiff::default();

    for (key, a) in left.iter() {
        let Some(b) = right.get(key) else {
            diff.only_left.push(key.clone());
            continue;
        };
        let mut fields = Vec::new();
        if a.param_values != b.param_values {
            fields.push("paramValues".to_string());
        }
        let names: BTreeSet<&String> = a.fields.keys().chain(b.fields.keys()).collect();
        fields.extend(
            names
                .into_iter()
                .filter(|name| a.fields.get(*name) != b.fields.get(*name))
                .cloned(),
        );
        if !fields.is_empty() {
            diff.changed.push((key.clone(), fields));
        }
    }

    diff.only_right = right
        .keys()
        .filter(|key| !left.contains_key(key))
        .cloned()
        .collect();
    diff
}
