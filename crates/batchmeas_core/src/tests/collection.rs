//! Reading batch directories with missing and broken records

use std::fs;

use tempfile::tempdir;

use super::fixtures::{record_json, write_batch_file};
use crate::collect::{CollectOptions, collect};
use crate::model::{CombinationKey, ParameterAxis, ParameterGrid};
use crate::source::BatchDirectory;

fn grid_5x4() -> ParameterGrid {
    ParameterGrid::new(vec![
        ParameterAxis::new("glutAmp", vec![0.5, 1.0, 1.5, 2.0, 2.5]),
        ParameterAxis::new("numSyns", vec![10, 20, 30, 40]),
    ])
    .unwrap()
}

/// Writes every record except three: one absent, one empty, one truncated
fn write_outputs(dir: &BatchDirectory, grid: &ParameterGrid) {
    write_batch_file(dir, grid);
    for c in grid.combinations() {
        let path = dir.record_path(&CombinationKey::encode(&c.indices));
        let body = serde_json::to_string(&record_json(c.indices[0], 0)).unwrap();
        match c.indices.as_slice() {
            [1, 2] => {}
            [3, 0] => fs::write(&path, "").unwrap(),
            [4, 3] => fs::write(&path, &body[..body.len() / 2]).unwrap(),
            _ => fs::write(&path, body).unwrap(),
        }
    }
}

#[test]
fn test_unreadable_records_are_counted_not_fatal() {
    let tmp = tempdir().unwrap();
    let dir = BatchDirectory::open(tmp.path(), "glutAmp");
    let grid = grid_5x4();
    write_outputs(&dir, &grid);

    let collection = collect(&dir.read_grid().unwrap(), &dir, &CollectOptions::default());
    assert_eq!(collection.missing, 3);
    assert_eq!(collection.results.len(), 17);
    for absent in [[1, 2], [3, 0], [4, 3]] {
        assert!(!collection.results.contains_key(&CombinationKey::encode(&absent)));
    }
}

#[test]
fn test_stored_values_match_their_keys() {
    let tmp = tempdir().unwrap();
    let dir = BatchDirectory::open(tmp.path(), "glutAmp");
    let grid = grid_5x4();
    write_outputs(&dir, &grid);

    let collection = collect(&grid, &dir, &CollectOptions::default());
    for (key, record) in collection.results.iter() {
        let from_values: Vec<usize> = record
            .param_values
            .iter()
            .enumerate()
            .map(|(axis, value)| grid.index_of(axis, value).unwrap())
            .collect();
        assert_eq!(key.decode_for(&grid), Ok(from_values), "record {key}");
    }
}

#[test]
fn test_cap_and_allow_list_count_as_missing() {
    let tmp = tempdir().unwrap();
    let dir = BatchDirectory::open(tmp.path(), "glutAmp");
    let grid = grid_5x4();
    write_outputs(&dir, &grid);

    // positions 0..8 cover glutAmp 0.5 and 1.0; [1, 2] is absent on disk
    let capped = collect(&grid, &dir, &CollectOptions::default().with_max_combinations(8));
    assert_eq!(capped.results.len(), 7);
    assert_eq!(capped.missing, 13);

    let match_file = tmp.path().join("match.json");
    fs::write(&match_file, r#"{"paramsMatch": [[2.5, 10], [2.5, 40], [1, 30]]}"#).unwrap();
    let options = CollectOptions::default().only_from_file(&match_file).unwrap();
    let listed = collect(&grid, &dir, &options);
    let keys: Vec<&str> = listed.results.keys().map(CombinationKey::as_str).collect();
    assert_eq!(keys, vec!["_4_0"]);
    assert_eq!(listed.missing, 19);
}
