// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end tests for the `strand-cachectl` binary against a populated
//! on-disk plan store.
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use strand_dry_tests::chain_graph;
use strand_plan_cache::{ExecutionPlanCache, GraphKey, SequentialPlan};
use strand_store_fs::FsPlanStore;

fn populate(root: &Path, graphs: &[(usize, u64)]) {
    let cache: ExecutionPlanCache<SequentialPlan, FsPlanStore> =
        ExecutionPlanCache::new(FsPlanStore::open(root).unwrap());
    for &(len, epoch) in graphs {
        let graph = chain_graph("g", len);
        let plan = Arc::new(SequentialPlan::compile(&graph).unwrap());
        cache.cache_plan(&graph, epoch, plan).unwrap();
    }
}

fn cachectl(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("strand-cachectl").unwrap();
    cmd.arg("--root").arg(root).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn stats_counts_entries_by_epoch() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[(3, 0), (10, 0), (3, 1)]);

    cachectl(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("entries:     3"))
        .stdout(predicate::str::contains("epoch 0: 2"))
        .stdout(predicate::str::contains("epoch 1: 1"))
        .stdout(predicate::str::contains("unreadable:  0"));
}

#[test]
fn list_as_json_reports_node_counts() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[(4, 2)]);

    let out = cachectl(dir.path())
        .args(["--format", "json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["epoch"], 2);
    assert_eq!(rows[0]["nodes"], 4);
    assert_eq!(rows[0]["terminals"], 1);
    assert_eq!(rows[0]["format"], 1);
}

#[test]
fn inspect_by_prefix_shows_graph_key() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[(3, 5)]);
    let digest = GraphKey::new(&chain_graph("other", 3), 5)
        .unwrap()
        .digest()
        .unwrap()
        .to_string();

    cachectl(dir.path())
        .args(["inspect", &digest[..8], "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("digest: {digest}")))
        .stdout(predicate::str::contains("epoch:  5"))
        .stdout(predicate::str::contains("nodes (3):"))
        .stdout(predicate::str::contains("raw key:"));
}

#[test]
fn inspect_unknown_digest_fails() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[(3, 0)]);

    cachectl(dir.path())
        .args(["inspect", "zz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry matches"));
}

#[test]
fn clear_needs_yes() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[(3, 0), (3, 1)]);

    cachectl(dir.path())
        .arg("clear")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    assert_eq!(FsPlanStore::open(dir.path()).unwrap().entries().unwrap().len(), 2);

    cachectl(dir.path())
        .args(["clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 2 entries"));
    assert!(FsPlanStore::open(dir.path()).unwrap().entries().unwrap().is_empty());
}
