//! Combination key encoding over random index tuples

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{CombinationKey, ParameterAxis, ParameterGrid};

#[test]
fn test_random_tuples_decode_to_themselves() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..2_000 {
        let len = rng.random_range(1..8);
        let tuple: Vec<usize> = (0..len)
            .map(|_| match rng.random_range(0..4) {
                0 => 0,
                1 => rng.random_range(1..10),
                2 => rng.random_range(10..10_000),
                _ => rng.random::<u32>() as usize,
            })
            .collect();
        let key = CombinationKey::encode(&tuple);
        assert_eq!(key.decode(), Ok(tuple.clone()), "key {key}");
        assert_eq!(CombinationKey::parse(key.as_str()), Ok(key));
    }
}

#[test]
fn test_keys_are_unique_across_a_grid() {
    let grid = ParameterGrid::new(vec![
        ParameterAxis::new("a", (0..11).collect::<Vec<i64>>()),
        ParameterAxis::new("b", (0..3).collect::<Vec<i64>>()),
        ParameterAxis::new("c", (0..12).collect::<Vec<i64>>()),
    ])
    .unwrap();

    let mut keys: Vec<CombinationKey> = grid
        .combinations()
        .map(|c| CombinationKey::encode(&c.indices))
        .collect();
    for key in &keys {
        let indices = key.decode_for(&grid).unwrap();
        assert_eq!(grid.values_at(&indices).map(|v| v.len()), Some(3));
    }
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
    assert_eq!(total, grid.combination_count());
}
