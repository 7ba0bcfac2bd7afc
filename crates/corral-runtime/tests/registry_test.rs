//! Integration tests for the shared pid registry: record round trips,
//! swap-remove semantics, corruption fail-fast, and cross-thread append
//! atomicity.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;

use corral_common::error::CorralError;
use corral_runtime::registry::{RECORD_WIDTH, Registry};

fn scratch_registry() -> (tempfile::TempDir, Registry) {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = Registry::open(dir.path().join("pids"));
    (dir, registry)
}

// ── Round trips ──────────────────────────────────────────────────────

#[test]
fn registry_push_then_get_round_trips_in_order() {
    let (_dir, registry) = scratch_registry();
    let pids = [101, 202, 303, 404];
    for pid in pids {
        registry.push(pid).expect("push");
    }

    assert_eq!(registry.count().expect("count"), pids.len() as u64);
    for (index, pid) in pids.iter().enumerate() {
        assert_eq!(
            registry.get(index as u64).expect("get"),
            Some(*pid),
            "record {index} should read back unchanged"
        );
    }
    assert_eq!(registry.get(pids.len() as u64).expect("get"), None);
}

#[test]
fn registry_starts_empty() {
    let (_dir, registry) = scratch_registry();
    assert_eq!(registry.count().expect("count"), 0);
    assert_eq!(registry.get(0).expect("get"), None);
}

// ── Removal ──────────────────────────────────────────────────────────

#[test]
fn registry_remove_absent_pid_is_a_byte_level_noop() {
    let (dir, registry) = scratch_registry();
    for pid in [11, 22, 33] {
        registry.push(pid).expect("push");
    }
    let before = std::fs::read(dir.path().join("pids")).expect("read");

    assert!(!registry.remove_by_pid(99).expect("remove"));

    let after = std::fs::read(dir.path().join("pids")).expect("read");
    assert_eq!(before, after, "an absent pid must leave the file untouched");
}

#[test]
fn registry_remove_present_pid_shrinks_by_one_record() {
    let (_dir, registry) = scratch_registry();
    let pids = [11, 22, 33, 44];
    for pid in pids {
        registry.push(pid).expect("push");
    }

    assert!(registry.remove_by_pid(22).expect("remove"));
    assert_eq!(registry.count().expect("count"), 3);

    let mut remaining = HashSet::new();
    let mut index = 0;
    while let Some(pid) = registry.get(index).expect("get") {
        assert!(remaining.insert(pid), "pids must stay unique");
        index += 1;
    }
    assert_eq!(remaining, HashSet::from([11, 33, 44]));
}

#[test]
fn registry_swap_remove_moves_last_record_into_the_hole() {
    let (_dir, registry) = scratch_registry();
    for pid in [1, 2, 3] {
        registry.push(pid).expect("push");
    }

    assert!(registry.remove_by_index(0).expect("remove"));
    // Index 0 now holds what was the last record; positions are not
    // stable handles.
    assert_eq!(registry.get(0).expect("get"), Some(3));
    assert_eq!(registry.get(1).expect("get"), Some(2));
}

#[test]
fn registry_remove_by_index_past_end_reports_false() {
    let (_dir, registry) = scratch_registry();
    registry.push(7).expect("push");
    assert!(!registry.remove_by_index(5).expect("remove"));
    assert_eq!(registry.count().expect("count"), 1);
}

#[test]
fn registry_remove_by_pid_takes_only_the_first_match() {
    let (_dir, registry) = scratch_registry();
    for pid in [5, 5, 9] {
        registry.push(pid).expect("push");
    }
    assert!(registry.remove_by_pid(5).expect("remove"));
    assert_eq!(registry.count().expect("count"), 2);
}

// ── Corruption ───────────────────────────────────────────────────────

#[test]
fn registry_truncated_file_fails_every_operation() {
    let (dir, registry) = scratch_registry();
    registry.push(42).expect("push");
    // Chop the file to a size that is not a whole number of records.
    let path = dir.path().join("pids");
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("open");
    file.set_len(RECORD_WIDTH + 1).expect("set_len");
    drop(file);

    assert!(matches!(
        registry.count(),
        Err(CorralError::CorruptRegistry { size: 5, .. })
    ));
    assert!(matches!(
        registry.get(0),
        Err(CorralError::CorruptRegistry { .. })
    ));
    assert!(matches!(
        registry.push(7),
        Err(CorralError::CorruptRegistry { .. })
    ));
    assert!(matches!(
        registry.remove_by_pid(42),
        Err(CorralError::CorruptRegistry { .. })
    ));
    assert!(matches!(
        registry.remove_by_index(0),
        Err(CorralError::CorruptRegistry { .. })
    ));
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn registry_concurrent_pushes_land_exactly_once_each() {
    let (dir, _registry) = scratch_registry();
    let path = dir.path().join("pids");
    const WRITERS: i32 = 16;

    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let path = path.clone();
            std::thread::spawn(move || {
                let registry = Registry::open(path);
                registry.push(1000 + n).expect("push");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let registry = Registry::open(path);
    assert_eq!(registry.count().expect("count"), WRITERS as u64);

    let mut seen = HashSet::new();
    let mut index = 0;
    while let Some(pid) = registry.get(index).expect("get") {
        assert!(seen.insert(pid), "no torn or duplicated records");
        index += 1;
    }
    assert_eq!(seen, (0..WRITERS).map(|n| 1000 + n).collect::<HashSet<_>>());
}
