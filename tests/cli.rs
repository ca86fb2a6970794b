mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{scratch, tree};
use mergeflow::core::merge::Merge;

fn mflow() -> Command {
    let mut cmd = Command::cargo_bin("mflow").unwrap();
    cmd.env("MFLOW_COLOR", "never");
    cmd
}

#[test]
fn merge_tree_prints_result_tree_and_exits_zero() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("shared", "s\n")]);
    let t1 = tree(&mut s.db, &[("shared", "s\n"), ("a", "x\n")]);
    let t2 = tree(&mut s.db, &[("shared", "s\n"), ("b", "y\n")]);

    let expected = {
        let mut merge = Merge::new(&mut s.db, common::options());
        merge.merge_trees(&t1, &t2, &base).unwrap().result_tree
    };

    mflow()
        .args([
            "merge-tree",
            "--git-dir",
            s.dir.path().to_str().unwrap(),
            "--base",
            &base,
            &t1,
            &t2,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn conflicting_merge_exits_one_and_reports_conflict() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[]);
    let t1 = tree(&mut s.db, &[("a", "x\n")]);
    let t2 = tree(&mut s.db, &[("a", "y\n")]);

    mflow()
        .args([
            "merge-tree",
            "--git-dir",
            s.dir.path().to_str().unwrap(),
            "--base",
            &base,
            &t1,
            &t2,
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CONFLICT (add/add)"))
        .stdout(predicate::str::contains("unmerged: a"));
}

#[test]
fn json_report_carries_stages() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[]);
    let t1 = tree(&mut s.db, &[("a", "x\n")]);
    let t2 = tree(&mut s.db, &[("a", "y\n")]);

    mflow()
        .args([
            "merge-tree",
            "--git-dir",
            s.dir.path().to_str().unwrap(),
            "--base",
            &base,
            "--json",
            &t1,
            &t2,
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"clean\": false"))
        .stdout(predicate::str::contains("\"result_tree\""))
        .stdout(predicate::str::contains("\"unmerged\""));
}

#[test]
fn unknown_command_exits_two() {
    mflow()
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a mflow command"));
}

#[test]
fn missing_git_dir_is_fatal() {
    mflow()
        .args(["merge", "--git-dir", "/nonexistent-dir", "aaaa", "bbbb"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fatal"));
}
