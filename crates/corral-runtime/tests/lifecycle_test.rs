//! Integration tests for stop and list: liveness filtering, the four
//! stop outcomes, and explicit pruning.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use corral_runtime::lifecycle::{self, StopOutcome};
use corral_runtime::registry::Registry;

fn scratch_registry() -> (tempfile::TempDir, Registry) {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = Registry::open(dir.path().join("pids"));
    (dir, registry)
}

/// Pid of a process that has already been reaped, so no process with
/// this pid exists (modulo recycling, which a just-reaped child makes
/// overwhelmingly unlikely within a test).
fn dead_pid() -> i32 {
    let mut child = std::process::Command::new("true").spawn().expect("spawn");
    let pid = child.id();
    let _ = child.wait().expect("wait");
    i32::try_from(pid).expect("pid fits i32")
}

fn self_pid() -> i32 {
    i32::try_from(std::process::id()).expect("pid fits i32")
}

// ── Listing ──────────────────────────────────────────────────────────

#[test]
fn list_filters_dead_pids_and_keeps_order() {
    let (_dir, registry) = scratch_registry();
    for pid in [100, 200, 300] {
        registry.push(pid).expect("push");
    }

    let live = lifecycle::list_with(&registry, |pid| pid != 200).expect("list");
    assert_eq!(live, vec![100, 300], "dead entry filtered, order kept");
}

#[test]
fn list_leaves_dead_entries_in_the_registry() {
    let (_dir, registry) = scratch_registry();
    for pid in [100, 200] {
        registry.push(pid).expect("push");
    }

    let _ = lifecycle::list_with(&registry, |_| false).expect("list");
    assert_eq!(
        registry.count().expect("count"),
        2,
        "list must not prune implicitly"
    );
}

#[test]
fn list_probes_real_liveness() {
    let (_dir, registry) = scratch_registry();
    registry.push(self_pid()).expect("push");
    registry.push(dead_pid()).expect("push");

    let live = lifecycle::list(&registry).expect("list");
    assert_eq!(live, vec![self_pid()]);
}

// ── Pruning ──────────────────────────────────────────────────────────

#[test]
fn prune_removes_only_dead_entries() {
    let (_dir, registry) = scratch_registry();
    for pid in [100, 200, 300, 400] {
        registry.push(pid).expect("push");
    }

    let removed =
        lifecycle::prune_with(&registry, |pid| pid == 100 || pid == 300).expect("prune");
    assert_eq!(removed, 2);

    let mut kept = Vec::new();
    let mut index = 0;
    while let Some(pid) = registry.get(index).expect("get") {
        kept.push(pid);
        index += 1;
    }
    kept.sort_unstable();
    assert_eq!(kept, vec![100, 300]);
}

#[test]
fn prune_on_all_live_registry_removes_nothing() {
    let (_dir, registry) = scratch_registry();
    for pid in [1, 2, 3] {
        registry.push(pid).expect("push");
    }
    let removed = lifecycle::prune_with(&registry, |_| true).expect("prune");
    assert_eq!(removed, 0);
    assert_eq!(registry.count().expect("count"), 3);
}

// ── Stop outcomes ────────────────────────────────────────────────────

#[test]
fn stop_unregistered_dead_pid_reports_both_failures() {
    let (_dir, registry) = scratch_registry();
    let outcome = lifecycle::stop(&registry, dead_pid(), 15).expect("stop");
    assert_eq!(outcome, StopOutcome::NotRegisteredAndNotRunning);
}

#[test]
fn stop_unregistered_live_pid_reports_not_registered() {
    let (_dir, registry) = scratch_registry();
    // Our own pid is alive but was never pushed; no signal may be sent.
    let outcome = lifecycle::stop(&registry, self_pid(), 15).expect("stop");
    assert_eq!(outcome, StopOutcome::NotRegistered);
}

#[test]
fn stop_registered_dead_pid_reports_not_running() {
    let (_dir, registry) = scratch_registry();
    let pid = dead_pid();
    registry.push(pid).expect("push");

    let outcome = lifecycle::stop(&registry, pid, 15).expect("stop");
    assert_eq!(outcome, StopOutcome::NotRunning);
    assert_eq!(
        registry.count().expect("count"),
        0,
        "stop removes the entry even when the process is gone"
    );
}

#[test]
fn stop_registered_live_pid_delivers_the_signal() {
    let (_dir, registry) = scratch_registry();
    registry.push(self_pid()).expect("push");

    // SIGCONT is harmless to deliver to ourselves.
    let outcome = lifecycle::stop(&registry, self_pid(), 18).expect("stop");
    assert!(matches!(outcome, StopOutcome::Delivered { .. }));
    assert_eq!(registry.count().expect("count"), 0);
}

#[test]
fn stop_repeated_on_same_pid_reports_not_found() {
    let (_dir, registry) = scratch_registry();
    registry.push(self_pid()).expect("push");

    let first = lifecycle::stop(&registry, self_pid(), 18).expect("stop");
    assert!(matches!(first, StopOutcome::Delivered { .. }));

    let second = lifecycle::stop(&registry, self_pid(), 18).expect("stop");
    assert_eq!(second, StopOutcome::NotRegistered);
}

#[test]
fn stop_rejects_invalid_signal_numbers() {
    let (_dir, registry) = scratch_registry();
    assert!(lifecycle::stop(&registry, self_pid(), 9999).is_err());
}

#[test]
fn process_exists_tracks_reality() {
    assert!(lifecycle::process_exists(self_pid()));
    assert!(!lifecycle::process_exists(dead_pid()));
}
