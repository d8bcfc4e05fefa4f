//! Property-based tests for fixtures and level storage
//!
//! These tests use proptest to check packing against a map-based model of
//! the inserted entries, across formats and duplicate policies.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tenbench_sparse::{
    capacity, DuplicatePolicy, FixtureBuilder, Format, ModeFormat, SparseTensor,
};

// ============================================================================
// Test Utilities
// ============================================================================

type Inserts = (Vec<usize>, Vec<(Vec<usize>, i64)>);

/// Random shape of rank 1..=3 plus random in-bounds inserts (with collisions)
fn inserts_strategy(max_inserts: usize) -> impl Strategy<Value = Inserts> {
    prop::collection::vec(1usize..6, 1..=3).prop_flat_map(move |shape| {
        let coord = shape
            .iter()
            .map(|&n| (0..n).boxed())
            .collect::<Vec<_>>();
        (
            Just(shape),
            prop::collection::vec((coord, -5i64..5), 0..=max_inserts),
        )
    })
}

fn mode_strategy(rank: usize) -> impl Strategy<Value = Vec<ModeFormat>> {
    prop::collection::vec(
        prop_oneof![Just(ModeFormat::Dense), Just(ModeFormat::Sparse)],
        rank..=rank,
    )
}

fn model(inserts: &[(Vec<usize>, i64)], policy: DuplicatePolicy) -> BTreeMap<Vec<usize>, i64> {
    let mut map = BTreeMap::new();
    for (coord, v) in inserts {
        match policy {
            DuplicatePolicy::Accumulate => *map.entry(coord.clone()).or_insert(0) += v,
            DuplicatePolicy::Overwrite => {
                map.insert(coord.clone(), *v);
            }
        }
    }
    map.retain(|_, v| *v != 0);
    map
}

// ============================================================================
// Packing Properties
// ============================================================================

proptest! {
    /// Property: packed non-zeros equal the accumulate model for any format
    #[test]
    fn prop_pack_matches_model(
        (shape, inserts) in inserts_strategy(40),
        seed_modes in mode_strategy(3),
    ) {
        let modes = seed_modes[..shape.len()].to_vec();
        let mut t = SparseTensor::new("T", shape.clone(), Format::new(modes)).unwrap();
        for (coord, v) in &inserts {
            t.insert(coord.clone(), *v).unwrap();
        }
        t.pack().unwrap();

        prop_assert_eq!(t.nonzeros(), model(&inserts, DuplicatePolicy::Accumulate));
    }

    /// Property: overwrite keeps the last value per coordinate
    #[test]
    fn prop_pack_overwrite_matches_model((shape, inserts) in inserts_strategy(40)) {
        let mut t = SparseTensor::new("T", shape.clone(), Format::sparse(shape.len()))
            .unwrap()
            .with_duplicate_policy(DuplicatePolicy::Overwrite);
        for (coord, v) in &inserts {
            t.insert(coord.clone(), *v).unwrap();
        }
        t.pack().unwrap();

        prop_assert_eq!(t.nonzeros(), model(&inserts, DuplicatePolicy::Overwrite));
    }

    /// Property: every stored entry can be located again
    #[test]
    fn prop_locate_finds_every_entry((shape, inserts) in inserts_strategy(30)) {
        let mut t = SparseTensor::new("T", shape.clone(), Format::sparse(shape.len())).unwrap();
        for (coord, v) in &inserts {
            t.insert(coord.clone(), *v).unwrap();
        }
        t.pack().unwrap();

        for (coord, value) in t.entries().unwrap() {
            prop_assert_eq!(t.get(&coord), Some(value));
        }
    }

    /// Property: repacking in reverse level order keeps the same non-zeros
    #[test]
    fn prop_repack_preserves_nonzeros((shape, inserts) in inserts_strategy(30)) {
        let mut t = SparseTensor::new("T", shape.clone(), Format::sparse(shape.len())).unwrap();
        for (coord, v) in &inserts {
            t.insert(coord.clone(), *v).unwrap();
        }
        t.pack().unwrap();

        let reversed: Vec<usize> = (0..shape.len()).rev().collect();
        let r = t.repack(&reversed).unwrap();
        prop_assert_eq!(r.nonzeros(), t.nonzeros());
    }
}

// ============================================================================
// Fixture Properties
// ============================================================================

proptest! {
    /// Property: fixture entry count never exceeds the requested inserts
    #[test]
    fn prop_fixture_count_bounded(
        extent in 1usize..200,
        n in 0usize..300,
        seed in any::<u64>(),
    ) {
        let t = FixtureBuilder::<i64>::new("A", vec![extent])
            .entries(n)
            .seed(seed)
            .build()
            .unwrap();

        prop_assert!(t.nnz() <= n);
        prop_assert!(t.nnz() <= capacity(&[extent]));
        // Accumulated values account for every insert
        let total: i64 = t.nonzeros().values().sum();
        prop_assert_eq!(total, 12 * n as i64);
    }

    /// Property: with overwrite every stored value is the fixture value
    #[test]
    fn prop_fixture_overwrite_values(
        rows in 1usize..20,
        cols in 1usize..20,
        n in 0usize..100,
        seed in any::<u64>(),
    ) {
        let t = FixtureBuilder::<i64>::new("B", vec![rows, cols])
            .entries(n)
            .seed(seed)
            .duplicate_policy(DuplicatePolicy::Overwrite)
            .build()
            .unwrap();

        prop_assert!(t.nonzeros().values().all(|&v| v == 12));
    }
}

// ============================================================================
// Pinned Duplicate Behaviour
// ============================================================================

/// Inserts at one coordinate accumulate into a single entry by default
#[test]
fn test_duplicate_coordinates_accumulate() -> anyhow::Result<()> {
    let t = FixtureBuilder::<i64>::new("A", vec![1]).entries(5).build()?;

    assert_eq!(t.nnz(), 1);
    assert_eq!(t.get(&[0]), Some(60));
    Ok(())
}

/// Inserts at one coordinate keep a single value under overwrite
#[test]
fn test_duplicate_coordinates_overwrite() -> anyhow::Result<()> {
    let t = FixtureBuilder::<i64>::new("A", vec![1])
        .entries(5)
        .duplicate_policy(DuplicatePolicy::Overwrite)
        .build()?;

    assert_eq!(t.nnz(), 1);
    assert_eq!(t.get(&[0]), Some(12));
    Ok(())
}

/// With no collisions the entry count equals the insert count
#[test]
fn test_distinct_coordinates_count() -> anyhow::Result<()> {
    let mut t = SparseTensor::<i64>::new("A", vec![100], Format::sparse(1))?;
    for c in (0..100).step_by(10) {
        t.insert(vec![c], 12)?;
    }
    t.pack()?;
    assert_eq!(t.nnz(), 10);
    Ok(())
}

/// Inserts that cancel out leave a stored zero, in any format and level order
#[test]
fn test_cancelled_inserts_stay_stored() -> anyhow::Result<()> {
    let formats = [
        Format::sparse(2),
        Format::new(vec![ModeFormat::Dense, ModeFormat::Sparse]),
        Format::new(vec![ModeFormat::Dense, ModeFormat::Dense]),
    ];
    for format in formats {
        let mut t = SparseTensor::<i64>::new("A", vec![3, 4], format)?;
        t.insert(vec![2, 1], 7)?;
        t.insert(vec![2, 1], -7)?;
        t.insert(vec![0, 3], 1)?;
        t.pack()?;

        assert_eq!(t.nnz(), 2);
        assert_eq!(t.get(&[2, 1]), Some(0));

        let r = t.repack(&[1, 0])?;
        assert_eq!(r.nnz(), 2);
        assert_eq!(r.get(&[2, 1]), Some(0));
        let mut coords: Vec<_> = r.entries()?.into_iter().map(|(c, _)| c).collect();
        coords.sort();
        assert_eq!(coords, vec![vec![0, 3], vec![2, 1]]);
    }
    Ok(())
}
