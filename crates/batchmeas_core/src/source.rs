//! Where per-combination output records come from.
//!
//! Directory layout written by the simulation runner:
//! <data_dir>/
//!   <label>/
//!     <label>_batch.json     # batch description with the parameter axes
//!     <label>_0_0.json       # one output record per combination
//!     <label>_0_1.json
//!     <label>_allData.json   # aggregate written by AggregateStore

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RecordError, StoreError};
use crate::model::{CombinationKey, FieldData, ParameterAxis, ParameterGrid};

/// Fields of one output record, before provenance is attached
pub type RecordFields = BTreeMap<String, FieldData>;

/// Accessor for per-combination output records
pub trait RecordSource {
    /// Read the record stored for `key`
    fn read(&self, key: &CombinationKey) -> Result<RecordFields, RecordError>;
}

/// A batch directory on disk
#[derive(Debug, Clone)]
pub struct BatchDirectory {
    root: PathBuf,
    label: String,
}

#[derive(Deserialize)]
struct BatchFile {
    batch: BatchSection,
}

#[derive(Deserialize)]
struct BatchSection {
    params: Vec<ParameterAxis>,
}

impl BatchDirectory {
    /// The batch `label` under `data_dir`
    pub fn open(data_dir: &Path, label: &str) -> Self {
        Self {
            root: data_dir.join(label),
            label: label.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn exists(&self) -> bool {
        self.batch_path().exists()
    }

    fn batch_path(&self) -> PathBuf {
        self.root.join(format!("{}_batch.json", self.label))
    }

    /// Path of the output record for `key`
    pub fn record_path(&self, key: &CombinationKey) -> PathBuf {
        self.root.join(format!("{}{}.json", self.label, key))
    }

    /// Path of the aggregate artifact
    pub fn aggregate_path(&self) -> PathBuf {
        self.root.join(format!("{}_allData.json", self.label))
    }

    /// Parse the parameter axes from the batch description
    pub fn read_grid(&self) -> Result<ParameterGrid, StoreError> {
        let path = self.batch_path();
        let content = fs::read_to_string(&path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", path.display())))?;
        let file: BatchFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Parse(format!("Failed to parse {}: {e}", path.display())))?;
        ParameterGrid::new(file.batch.params)
            .map_err(|e| StoreError::Parse(format!("Invalid grid in {}: {e}", path.display())))
    }
}

impl RecordSource for BatchDirectory {
    fn read(&self, key: &CombinationKey) -> Result<RecordFields, RecordError> {
        let path = self.record_path(key);
        let content = fs::read_to_string(&path)
            .map_err(|e| RecordError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| RecordError::Parse(format!("{}: {e}", path.display())))
    }
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: BTreeMap<CombinationKey, RecordFields>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CombinationKey, fields: RecordFields) {
        self.records.insert(key, fields);
    }
}

impl RecordSource for MemorySource {
    fn read(&self, key: &CombinationKey) -> Result<RecordFields, RecordError> {
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| RecordError::Io(format!("no record stored for {key}")))
    }
}

/// Labels of the batches under `data_dir`, sorted by name.
///
/// A batch is a directory holding its `<label>_batch.json` description.
pub fn list_batches(data_dir: &Path) -> Result<Vec<String>, StoreError> {
    let entries = fs::read_dir(data_dir)
        .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", data_dir.display())))?;

    let mut labels: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|label| BatchDirectory::open(data_dir, label).exists())
        .collect();
    labels.sort();
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BATCH: &str = r#"{
        "batch": {
            "batchLabel": "sweep",
            "saveFolder": "data/sweep",
            "params": [
                {"label": "glutAmp", "values": [0.5, 1.0, 1.5]},
                {"label": "loc", "values": [0.2, 0.8], "group": true}
            ]
        }
    }"#;

    #[test]
    fn test_paths() {
        let dir = BatchDirectory::open(Path::new("/data"), "sweep");
        assert_eq!(
            dir.record_path(&CombinationKey::encode(&[2, 0])),
            PathBuf::from("/data/sweep/sweep_2_0.json")
        );
        assert_eq!(
            dir.aggregate_path(),
            PathBuf::from("/data/sweep/sweep_allData.json")
        );
    }

    #[test]
    fn test_read_grid_and_list() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sweep")).unwrap();
        fs::write(tmp.path().join("sweep/sweep_batch.json"), BATCH).unwrap();
        fs::create_dir_all(tmp.path().join("stray")).unwrap();

        let dir = BatchDirectory::open(tmp.path(), "sweep");
        let grid = dir.read_grid().unwrap();
        assert_eq!(grid.shape(), vec![3, 2]);
        assert_eq!(grid.grouped_axis(), Some(1));

        assert_eq!(list_batches(tmp.path()).unwrap(), vec!["sweep".to_string()]);
        assert!(list_batches(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_read_record() {
        let tmp = tempdir().unwrap();
        let dir = BatchDirectory::open(tmp.path(), "b");
        fs::create_dir_all(dir.root()).unwrap();
        let key = CombinationKey::encode(&[0]);
        fs::write(
            dir.record_path(&key),
            r#"{"simData": {"V_soma": {"cell_0": [1.0, 2.0]}, "spkt": []}}"#,
        )
        .unwrap();

        let fields = dir.read(&key).unwrap();
        assert_eq!(
            fields["simData"].child("V_soma").and_then(|f| f.series("cell_0")),
            Some(&[1.0, 2.0][..])
        );
        assert!(matches!(
            dir.read(&CombinationKey::encode(&[1])),
            Err(RecordError::Io(_))
        ));

        fs::write(dir.record_path(&key), "{not json").unwrap();
        assert!(matches!(dir.read(&key), Err(RecordError::Parse(_))));
    }
}
