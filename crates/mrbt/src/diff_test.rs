// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

use crate::test_helper::{consistency_check, tree_of};
use crate::{ChangeRecord, ChangeSide, MerkleRedBlackTree};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

fn sorted(mut records: Vec<ChangeRecord<String>>) -> Vec<ChangeRecord<String>> {
    records.sort();
    records
}

/// Applies a change set computed as `source.change_set(&destination)` onto
/// `source`, which must then equal `destination`.
fn apply(
    source: &mut MerkleRedBlackTree<String>,
    records: &[ChangeRecord<String>],
) {
    for record in records {
        if record.side == ChangeSide::Source {
            source.delete(record.key);
        }
    }
    for record in records {
        if record.side == ChangeSide::Destination {
            source.upsert(record.key, record.value.clone()).unwrap();
        }
    }
}

#[test]
fn test_change_set_example() {
    let source = MerkleRedBlackTree::from_pairs([
        (1, "one".to_string()),
        (2, "two".to_string()),
        (5, "five".to_string()),
    ])
    .unwrap();
    let destination = MerkleRedBlackTree::from_pairs([
        (1, "one".to_string()),
        (2, "six".to_string()),
    ])
    .unwrap();

    let records = source.change_set(&destination);
    assert_eq!(records.len(), 3);
    assert_eq!(
        sorted(records),
        sorted(vec![
            ChangeRecord {
                side: ChangeSide::Source,
                key: 2,
                value: "two".to_string(),
            },
            ChangeRecord {
                side: ChangeSide::Destination,
                key: 2,
                value: "six".to_string(),
            },
            ChangeRecord {
                side: ChangeSide::Source,
                key: 5,
                value: "five".to_string(),
            },
        ])
    );
}

#[test]
fn test_change_set_of_equal_trees_is_empty() {
    let mut rng = StdRng::seed_from_u64(0xd0);
    let mut keys: Vec<i128> = (0..200).collect();
    keys.shuffle(&mut rng);
    let first = tree_of(&keys);
    keys.shuffle(&mut rng);
    let second = tree_of(&keys);

    assert!(first.change_set(&second).is_empty());
    assert!(first.change_set(&first).is_empty());
    assert!(first.change_set_merge(&second).is_empty());
}

#[test]
fn test_change_set_counts_deletions() {
    let size = 400;
    let mut rng = StdRng::seed_from_u64(0xd1);
    let mut keys: Vec<i128> = (0..size).collect();
    keys.shuffle(&mut rng);
    let full = tree_of(&keys);

    for count in [1usize, 10, 40] {
        let removed: Vec<i128> = keys.choose_multiple(&mut rng, count).copied().collect();
        let mut partial = full.clone();
        for &key in &removed {
            assert!(partial.delete(key));
        }
        consistency_check(&partial).unwrap();

        let forward = full.change_set(&partial);
        assert_eq!(forward.len(), removed.len());
        assert!(forward.iter().all(|record| record.side == ChangeSide::Source));

        let backward = partial.change_set(&full);
        assert_eq!(backward.len(), removed.len());
        assert!(
            backward
                .iter()
                .all(|record| record.side == ChangeSide::Destination)
        );
    }
}

#[test]
fn test_change_set_counts_modifications() {
    let mut rng = StdRng::seed_from_u64(0xd2);
    let mut keys: Vec<i128> = (0..200).collect();
    keys.shuffle(&mut rng);
    let source = tree_of(&keys);

    let mut destination = source.clone();
    let modified: Vec<i128> = keys.choose_multiple(&mut rng, 17).copied().collect();
    for &key in &modified {
        assert!(destination.set(key, "changed".to_string()).unwrap());
    }

    // A modified key contributes one record per side.
    let records = source.change_set(&destination);
    assert_eq!(records.len(), 2 * modified.len());
    for &key in &modified {
        assert!(records.iter().any(|record| {
            record.side == ChangeSide::Source && record.key == key
        }));
        assert!(records.iter().any(|record| {
            record.side == ChangeSide::Destination
                && record.key == key
                && record.value == "changed"
        }));
    }
}

#[test]
fn test_change_set_against_empty() {
    let keys: Vec<i128> = (0..50).collect();
    let tree = tree_of(&keys);
    let empty: MerkleRedBlackTree<String> = MerkleRedBlackTree::new();

    let forward = tree.change_set(&empty);
    assert_eq!(forward.len(), keys.len());
    assert!(forward.iter().all(|record| record.side == ChangeSide::Source));

    let backward = empty.change_set(&tree);
    assert_eq!(backward.len(), keys.len());
    assert!(
        backward
            .iter()
            .all(|record| record.side == ChangeSide::Destination)
    );
    assert!(empty.change_set(&empty).is_empty());
}

#[test]
fn test_pruned_and_merge_agree() {
    let mut rng = StdRng::seed_from_u64(0xd3);
    let mut keys: Vec<i128> = (-150..150).collect();
    keys.shuffle(&mut rng);
    let source = tree_of(&keys);

    let mut destination = source.clone();
    for &key in keys.iter().take(20) {
        destination.delete(key);
    }
    for &key in keys.iter().skip(20).take(10) {
        destination.set(key, "changed".to_string()).unwrap();
    }
    for key in 500..510 {
        destination.insert(key, "fresh".to_string()).unwrap();
    }

    assert_eq!(
        sorted(source.change_set(&destination)),
        sorted(source.change_set_merge(&destination))
    );
}

#[test]
fn test_applying_change_set_reaches_destination() {
    let mut rng = StdRng::seed_from_u64(0xd4);
    let mut keys: Vec<i128> = (0..300).collect();
    keys.shuffle(&mut rng);
    let mut source = tree_of(&keys);

    let mut destination = source.clone();
    for &key in keys.iter().take(30) {
        destination.delete(key);
    }
    for &key in keys.iter().skip(30).take(15) {
        destination.set(key, "rewritten".to_string()).unwrap();
    }
    for key in 1000..1020 {
        destination.insert(key, "appended".to_string()).unwrap();
    }

    let records = source.change_set(&destination);
    apply(&mut source, &records);
    consistency_check(&source).unwrap();
    assert_eq!(source.digest(), destination.digest());
    assert_eq!(source, destination);
    assert!(source.change_set(&destination).is_empty());
}

#[test]
fn test_change_record_serde_round_trip() {
    let source = tree_of(&[1, 2]);
    let destination = tree_of(&[2, 3]);
    let records = source.change_set(&destination);
    let encoded = serde_json::to_string(&records).unwrap();
    let decoded: Vec<ChangeRecord<String>> = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, records);
}
