use std::collections::BTreeMap;

use laced_tree::LacedTree;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Number of keys in the dense scenarios.
const NUM_KEYS: i64 = 1000;

fn shuffled_keys(rng: &mut StdRng) -> Vec<i64> {
    let mut keys: Vec<i64> = (0..NUM_KEYS).collect();
    keys.shuffle(rng);
    keys
}

/// Dense key set inserted in shuffled order: every prefix is fully readable,
/// unseen keys stay invisible, and enumeration comes back sorted.
#[test]
fn shuffled_dense_insertion_reads_back() {
    let mut rng = StdRng::seed_from_u64(0);
    let keys = shuffled_keys(&mut rng);

    let mut index = LacedTree::new();
    for (i, &key) in keys.iter().enumerate() {
        assert!(!index.insert(key, key as u64).at_end(), "insert({key}) failed");

        for &seen in &keys[..=i] {
            assert!(!index.find(seen).at_end(), "find({seen}) failed after {} inserts", i + 1);
        }
        for &unseen in keys[i + 1..].iter().take(10) {
            assert!(index.find(unseen).at_end(), "find({unseen}) succeeded before its insert");
        }
    }
    assert_eq!(index.len() as i64, NUM_KEYS);

    for key in NUM_KEYS..NUM_KEYS + 10 {
        assert!(index.find(key).at_end());
    }

    let mut collected = Vec::new();
    index.collect_keys(&mut collected, false);
    let expected: Vec<i64> = (0..NUM_KEYS).collect();
    assert_eq!(collected, expected);

    collected.clear();
    index.collect_keys(&mut collected, true);
    let reversed: Vec<i64> = (0..NUM_KEYS).rev().collect();
    assert_eq!(collected, reversed);
}

/// Shuffled removal down to the empty tree: sizes, visibility, and the
/// empty-leaf end state.
#[test]
fn shuffled_removal_drains_the_index() {
    let mut rng = StdRng::seed_from_u64(0);

    let mut index = LacedTree::new();
    for key in 0..NUM_KEYS {
        assert!(!index.insert(key, key as u64).at_end());
    }

    let keys = shuffled_keys(&mut rng);
    for (i, &key) in keys.iter().enumerate() {
        assert!(index.remove(key), "remove({key}) failed");
        assert_eq!(index.len() as i64, NUM_KEYS - i as i64 - 1);

        for &gone in &keys[..=i] {
            assert!(index.find(gone).at_end(), "find({gone}) succeeded after its removal");
        }
        for &left in &keys[i + 1..] {
            assert!(!index.find(left).at_end(), "find({left}) failed while still present");
        }
    }

    assert_eq!(index.len(), 0);
    assert!(index.is_empty());
    for key in 0..=NUM_KEYS {
        assert!(!index.remove(key));
    }
    let mut collected = Vec::new();
    index.collect_keys(&mut collected, false);
    assert!(collected.is_empty());
}

/// A long mixed operation stream must match an ordered-map oracle
/// step-for-step: every return value and the running size.
#[test]
fn mixed_stream_matches_the_oracle() {
    const NUM_OPS: usize = 100_000;
    const KEY_SPACE: i64 = 100_000;

    let mut rng = StdRng::seed_from_u64(0);
    let mut index = LacedTree::new();
    let mut oracle: BTreeMap<i64, u64> = BTreeMap::new();

    for step in 0..NUM_OPS {
        let key = rng.gen_range(0..KEY_SPACE);
        let stamp = step as u64;
        match rng.gen_range(0..5) {
            0 => {
                assert_eq!(index.find(key).value(), oracle.get(&key), "find({key}) diverged at step {step}");
            }
            1 => {
                let inserted = !index.insert(key, stamp).at_end();
                let absent = !oracle.contains_key(&key);
                assert_eq!(inserted, absent, "insert({key}) diverged at step {step}");
                if absent {
                    oracle.insert(key, stamp);
                }
            }
            2 => {
                let updated = index.update(key, stamp);
                let present = oracle.contains_key(&key);
                assert_eq!(updated, present, "update({key}) diverged at step {step}");
                if present {
                    oracle.insert(key, stamp);
                }
            }
            3 => {
                assert!(!index.upsert(key, stamp).at_end());
                oracle.insert(key, stamp);
            }
            _ => {
                assert_eq!(index.remove(key), oracle.remove(&key).is_some(), "remove({key}) diverged at step {step}");
            }
        }
        assert_eq!(index.len(), oracle.len(), "size diverged at step {step}");
    }

    let mut collected = Vec::new();
    index.collect_keys(&mut collected, false);
    let expected: Vec<i64> = oracle.keys().copied().collect();
    assert_eq!(collected, expected);
}

// ─── Randomized model tests ──────────────────────────────────────────────────

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 10_000;

/// Keys drawn from a range narrow enough to force collisions.
fn key_strategy() -> impl Strategy<Value = i64> {
    -20_000i64..20_000i64
}

#[derive(Debug, Clone)]
enum IndexOp {
    Find(i64),
    Insert(i64, u64),
    Update(i64, u64),
    Upsert(i64, u64),
    Remove(i64),
}

fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        2 => key_strategy().prop_map(IndexOp::Find),
        5 => (key_strategy(), any::<u64>()).prop_map(|(k, v)| IndexOp::Insert(k, v)),
        2 => (key_strategy(), any::<u64>()).prop_map(|(k, v)| IndexOp::Update(k, v)),
        3 => (key_strategy(), any::<u64>()).prop_map(|(k, v)| IndexOp::Upsert(k, v)),
        3 => key_strategy().prop_map(IndexOp::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays a random operation stream on both `LacedTree` and `BTreeMap`
    /// and asserts identical observable results at every step.
    #[test]
    fn index_ops_match_btreemap(ops in proptest::collection::vec(index_op_strategy(), TEST_SIZE)) {
        let mut index: LacedTree<u64> = LacedTree::new();
        let mut model: BTreeMap<i64, u64> = BTreeMap::new();

        for op in &ops {
            match *op {
                IndexOp::Find(k) => {
                    prop_assert_eq!(index.find(k).value(), model.get(&k), "find({})", k);
                }
                IndexOp::Insert(k, v) => {
                    let inserted = !index.insert(k, v).at_end();
                    let absent = !model.contains_key(&k);
                    prop_assert_eq!(inserted, absent, "insert({}, {})", k, v);
                    if absent {
                        model.insert(k, v);
                    }
                }
                IndexOp::Update(k, v) => {
                    let updated = index.update(k, v);
                    let present = model.contains_key(&k);
                    prop_assert_eq!(updated, present, "update({}, {})", k, v);
                    if present {
                        model.insert(k, v);
                    }
                }
                IndexOp::Upsert(k, v) => {
                    prop_assert_eq!(index.upsert(k, v).value(), Some(&v), "upsert({}, {})", k, v);
                    model.insert(k, v);
                }
                IndexOp::Remove(k) => {
                    prop_assert_eq!(index.remove(k), model.remove(&k).is_some(), "remove({})", k);
                }
            }
            prop_assert_eq!(index.len(), model.len(), "len mismatch after {:?}", op);
        }
    }

    /// Enumeration in both directions matches the model after random inserts.
    #[test]
    fn enumeration_matches_btreemap(entries in proptest::collection::vec((key_strategy(), any::<u64>()), TEST_SIZE)) {
        let mut index: LacedTree<u64> = LacedTree::new();
        let mut model: BTreeMap<i64, u64> = BTreeMap::new();

        for &(k, v) in &entries {
            index.upsert(k, v);
            model.insert(k, v);
        }

        let mut forward = Vec::new();
        index.collect_keys(&mut forward, false);
        let expected: Vec<i64> = model.keys().copied().collect();
        prop_assert_eq!(&forward, &expected, "forward enumeration mismatch");

        let mut backward = Vec::new();
        index.collect_keys(&mut backward, true);
        backward.reverse();
        prop_assert_eq!(&backward, &forward, "backward enumeration is not the reverse");

        prop_assert_eq!(forward.len(), index.len());
    }
}
