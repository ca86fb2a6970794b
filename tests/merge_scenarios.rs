mod common;

use common::{blob, commit, flatten, options, scratch, tree, tree_with_modes};
use mergeflow::core::file_mode::FileMode;
use mergeflow::core::merge::{DirRenameDetection, Merge, MergeOptions, RecursiveVariant};

#[test]
fn add_add_conflict_merges_with_markers() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[]);
    let side1 = tree(&mut s.db, &[("a", "x\n")]);
    let side2 = tree(&mut s.db, &[("a", "y\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    assert_eq!(outcome.unmerged.len(), 1);
    let entry = &outcome.unmerged[0];
    assert_eq!(entry.path, "a");
    assert!(entry.stages[0].is_none());
    assert!(entry.stages[1].is_some());
    assert!(entry.stages[2].is_some());
    assert_ne!(entry.stages[1], entry.stages[2]);

    let files = flatten(&mut s.db, &outcome.result_tree);
    let (_, content) = &files["a"];
    assert!(content.contains("<<<<<<< main"));
    assert!(content.contains("x\n"));
    assert!(content.contains("=======\n"));
    assert!(content.contains("y\n"));
    assert!(content.contains(">>>>>>> feature"));
}

#[test]
fn rename_with_edit_merges_clean() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "hello\n")]);
    let side1 = tree(&mut s.db, &[("g", "hello\n")]);
    let side2 = tree(&mut s.db, &[("f", "hello world\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["g"].1, "hello world\n");
    assert!(!files.contains_key("f"));
}

#[test]
fn directory_rename_majority_moves_new_files() {
    let mut s = scratch();
    let base = tree(
        &mut s.db,
        &[("d/a", "alpha\n"), ("d/b", "bravo\n"), ("d/c", "charlie\n")],
    );
    let side1 = tree(
        &mut s.db,
        &[("e/a", "alpha\n"), ("e/b", "bravo\n"), ("d/c", "charlie\n")],
    );
    let side2 = tree(
        &mut s.db,
        &[
            ("d/a", "alpha\n"),
            ("d/b", "bravo\n"),
            ("d/c", "charlie\n"),
            ("d/x", "extra\n"),
        ],
    );

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    let paths: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["d/c", "e/a", "e/b", "e/x"]);
    assert_eq!(files["e/x"].1, "extra\n");
}

#[test]
fn directory_rename_detection_can_be_disabled() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("d/a", "alpha\n"), ("d/b", "bravo\n")]);
    let side1 = tree(&mut s.db, &[("e/a", "alpha\n"), ("e/b", "bravo\n")]);
    let side2 = tree(
        &mut s.db,
        &[("d/a", "alpha\n"), ("d/b", "bravo\n"), ("d/x", "extra\n")],
    );

    let opts = MergeOptions {
        detect_directory_renames: DirRenameDetection::None,
        ..options()
    };
    let mut merge = Merge::new(&mut s.db, opts);
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    let files = flatten(&mut s.db, &outcome.result_tree);
    assert!(files.contains_key("d/x"), "paths: {:?}", files.keys());
    assert!(!files.contains_key("e/x"));
}

#[test]
fn rename_rename_split_reports_both_destinations() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "one\n")]);
    let side1 = tree(&mut s.db, &[("g", "one\n")]);
    let side2 = tree(&mut s.db, &[("h", "one\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    let unmerged_paths: Vec<&str> = outcome.unmerged.iter().map(|e| e.path.as_str()).collect();
    assert!(unmerged_paths.contains(&"g"));
    assert!(unmerged_paths.contains(&"h"));

    let files = flatten(&mut s.db, &outcome.result_tree);
    assert!(!files.contains_key("f"));
    assert_eq!(files["g"].1, "one\n");
    assert_eq!(files["h"].1, "one\n");
    assert!(outcome.output.contains("CONFLICT (rename/rename)"));
}

#[test]
fn rename_rename_to_one_destination_collides_with_wide_markers() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("a", "from a\n"), ("b", "from b\n")]);
    // side1 renames a to dest and keeps b; side2 renames b to dest and keeps a
    let side1 = tree(&mut s.db, &[("dest", "from a\n"), ("b", "from b\n")]);
    let side2 = tree(&mut s.db, &[("a", "from a\n"), ("dest", "from b\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    assert!(outcome.output.contains("CONFLICT (rename/rename)"));

    let files = flatten(&mut s.db, &outcome.result_tree);
    let paths: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["dest"]);

    let (_, content) = &files["dest"];
    // both renamed files collapse here: nested merge, doubled markers,
    // labeled with the original paths
    assert!(
        content.contains(&format!("{} main:a", "<".repeat(14))),
        "content: {}",
        content
    );
    assert!(
        content.contains(&format!("{} feature:b", ">".repeat(14))),
        "content: {}",
        content
    );
    assert!(content.contains("from a\n"));
    assert!(content.contains("from b\n"));

    assert_eq!(outcome.unmerged.len(), 1);
    let entry = &outcome.unmerged[0];
    assert_eq!(entry.path, "dest");
    assert_eq!(entry.stage_paths[1].as_deref(), Some("a"));
    assert_eq!(entry.stage_paths[2].as_deref(), Some("b"));
}

#[test]
fn modify_delete_keeps_modified_version() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "1\n")]);
    let side1 = tree(&mut s.db, &[]);
    let side2 = tree(&mut s.db, &[("f", "2\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["f"].1, "2\n");

    assert_eq!(outcome.unmerged.len(), 1);
    let entry = &outcome.unmerged[0];
    assert_eq!(entry.path, "f");
    assert!(entry.stages[0].is_some());
    assert!(entry.stages[1].is_none());
    assert!(entry.stages[2].is_some());
    assert!(outcome.output.contains("CONFLICT (modify/delete)"));
}

#[test]
fn file_directory_conflict_moves_file_aside() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[]);
    let side1 = tree(&mut s.db, &[("p", "file\n")]);
    let side2 = tree(&mut s.db, &[("p/inner", "deep\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["p/inner"].1, "deep\n");
    assert_eq!(files["p~main"].1, "file\n");

    let unmerged_paths: Vec<&str> = outcome.unmerged.iter().map(|e| e.path.as_str()).collect();
    assert!(unmerged_paths.contains(&"p"));
    assert!(unmerged_paths.contains(&"p~main"));
    assert!(outcome.output.contains("CONFLICT (file/directory)"));
}

#[test]
fn merging_a_tree_with_itself_is_identity() {
    let mut s = scratch();
    let t = tree(&mut s.db, &[("a", "1\n"), ("d/b", "2\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&t, &t, &t).unwrap();

    assert!(outcome.clean);
    assert_eq!(outcome.result_tree, t);
    assert!(outcome.unmerged.is_empty());
}

#[test]
fn unchanged_side_fast_forwards_to_the_other() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("a", "1\n"), ("d/b", "2\n"), ("gone", "x\n")]);
    let side2 = tree(&mut s.db, &[("a", "1 edited\n"), ("d/b", "2\n"), ("new", "n\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&base, &side2, &base).unwrap();

    assert!(outcome.clean);
    assert_eq!(outcome.result_tree, side2);
}

#[test]
fn merge_is_deterministic() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "base\n"), ("d/k", "k\n")]);
    let side1 = tree(&mut s.db, &[("f", "ours\n"), ("d/k", "k\n")]);
    let side2 = tree(&mut s.db, &[("f", "theirs\n"), ("d/k", "k2\n")]);

    let first = {
        let mut merge = Merge::new(&mut s.db, options());
        merge.merge_trees(&side1, &side2, &base).unwrap()
    };
    let second = {
        let mut merge = Merge::new(&mut s.db, options());
        merge.merge_trees(&side1, &side2, &base).unwrap()
    };

    assert_eq!(first.result_tree, second.result_tree);
    let first_paths: Vec<&str> = first.unmerged.iter().map(|e| e.path.as_str()).collect();
    let second_paths: Vec<&str> = second.unmerged.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(first_paths, second_paths);
}

#[test]
fn non_overlapping_edits_content_merge_clean() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "1\n2\n3\n")]);
    let side1 = tree(&mut s.db, &[("f", "1changed\n2\n3\n")]);
    let side2 = tree(&mut s.db, &[("f", "1\n2\n3changed\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["f"].1, "1changed\n2\n3changed\n");
}

#[test]
fn favor_ours_resolves_overlapping_edits() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "line\n")]);
    let side1 = tree(&mut s.db, &[("f", "ours\n")]);
    let side2 = tree(&mut s.db, &[("f", "theirs\n")]);

    let opts = MergeOptions {
        recursive_variant: RecursiveVariant::FavorOurs,
        ..options()
    };
    let mut merge = Merge::new(&mut s.db, opts);
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["f"].1, "ours\n");
}

#[test]
fn executable_bit_change_is_kept() {
    let mut s = scratch();
    let content = blob(&mut s.db, "#!/bin/sh\n");
    let base = tree_with_modes(&mut s.db, &[("run", &content, FileMode::REGULAR)]);
    let side1 = tree_with_modes(&mut s.db, &[("run", &content, FileMode::EXECUTABLE)]);
    let side2 = tree_with_modes(&mut s.db, &[("run", &content, FileMode::REGULAR)]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["run"].0, "100755");
}

#[test]
fn rename_add_doubles_conflict_markers() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "a\nb\nc\n")]);
    // side1 renames f to g unchanged; side2 edits f and independently adds g
    let side1 = tree(&mut s.db, &[("g", "a\nb\nc\n")]);
    let side2 = tree(&mut s.db, &[("f", "a\nB\nc\n"), ("g", "other\n")]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    assert!(outcome.output.contains("CONFLICT (rename/add)"));

    let files = flatten(&mut s.db, &outcome.result_tree);
    assert!(!files.contains_key("f"));
    let (_, content) = &files["g"];
    // nested content merge: markers are twice the default width
    assert!(content.contains(&"<".repeat(14)), "content: {}", content);
    assert!(content.contains("a\nB\nc\n"));
    assert!(content.contains("other\n"));
}

#[test]
fn rename_delete_conflicts_at_destination() {
    let mut s = scratch();
    let base = tree(&mut s.db, &[("f", "one\ntwo\nthree\nfour\n")]);
    let side1 = tree(&mut s.db, &[("g", "one\ntwo\nthree\nfour\nfive\n")]);
    let side2 = tree(&mut s.db, &[]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    assert!(outcome.output.contains("CONFLICT (rename/delete)"));
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert!(!files.contains_key("f"));
    assert_eq!(files["g"].1, "one\ntwo\nthree\nfour\nfive\n");
}

#[test]
fn criss_cross_history_merges_through_virtual_base() {
    let mut s = scratch();
    let base_tree = tree(&mut s.db, &[("f", "base\n")]);
    let b1_tree = tree(&mut s.db, &[("f", "left\n")]);
    let b2_tree = tree(&mut s.db, &[("f", "base\n"), ("g", "g\n")]);
    let m1_tree = tree(&mut s.db, &[("f", "left\n"), ("g", "g\n")]);
    let m2_tree = tree(&mut s.db, &[("f", "left\n"), ("g", "g\n"), ("h", "h\n")]);

    let x = commit(&mut s.db, &base_tree, &[]);
    let b1 = commit(&mut s.db, &b1_tree, &[&x]);
    let b2 = commit(&mut s.db, &b2_tree, &[&x]);
    let m1 = commit(&mut s.db, &m1_tree, &[&b1, &b2]);
    let m2 = commit(&mut s.db, &m2_tree, &[&b2, &b1]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_commits(&m1, &m2, None).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    let paths: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["f", "g", "h"]);
    assert_eq!(files["f"].1, "left\n");
}

#[test]
fn favor_variant_applies_during_base_folding() {
    let mut s = scratch();
    let base_tree = tree(&mut s.db, &[("f", "base\n")]);
    let one_tree = tree(&mut s.db, &[("f", "one\n")]);
    let two_tree = tree(&mut s.db, &[("f", "two\n")]);

    let x = commit(&mut s.db, &base_tree, &[]);
    let b1 = commit(&mut s.db, &one_tree, &[&x]);
    let b2 = commit(&mut s.db, &two_tree, &[&x]);
    let m1 = commit(&mut s.db, &one_tree, &[&b1, &b2]);
    let m2 = commit(&mut s.db, &two_tree, &[&b2, &b1]);

    let opts = MergeOptions {
        recursive_variant: RecursiveVariant::FavorOurs,
        ..options()
    };
    let mut merge = Merge::new(&mut s.db, opts);
    let outcome = merge
        .merge_commits(&m1, &m2, Some(vec![b1.clone(), b2.clone()]))
        .unwrap();

    // favor-ours resolves the folded base to b1's content, which makes m1
    // the unchanged side, so m2's edit wins cleanly; without the favor the
    // virtual base would carry markers and the outer merge would re-conflict
    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["f"].1, "two\n");
}

#[test]
fn unrelated_histories_merge_against_empty_tree() {
    let mut s = scratch();
    let t1 = tree(&mut s.db, &[("a", "1\n")]);
    let t2 = tree(&mut s.db, &[("b", "2\n")]);
    let r1 = commit(&mut s.db, &t1, &[]);
    let r2 = commit(&mut s.db, &t2, &[]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_commits(&r1, &r2, None).unwrap();

    assert!(outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    let paths: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["a", "b"]);
}

#[test]
fn submodule_fast_forwards_to_descendant() {
    let mut s = scratch();
    let sub_tree = tree(&mut s.db, &[("sub-file", "content\n")]);
    let c1 = commit(&mut s.db, &sub_tree, &[]);
    let c2 = commit(&mut s.db, &sub_tree, &[&c1]);
    let c3 = commit(&mut s.db, &sub_tree, &[&c2]);

    let base = tree_with_modes(&mut s.db, &[("mod", &c1, FileMode::GITLINK)]);
    let side1 = tree_with_modes(&mut s.db, &[("mod", &c2, FileMode::GITLINK)]);
    let side2 = tree_with_modes(&mut s.db, &[("mod", &c3, FileMode::GITLINK)]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["mod"], ("160000".to_string(), c3));
}

#[test]
fn diverged_submodule_conflicts_and_keeps_side1() {
    let mut s = scratch();
    let sub_tree = tree(&mut s.db, &[("sub-file", "content\n")]);
    let c1 = commit(&mut s.db, &sub_tree, &[]);
    let tree_a = tree(&mut s.db, &[("sub-file", "a\n")]);
    let tree_b = tree(&mut s.db, &[("sub-file", "b\n")]);
    let c2a = commit(&mut s.db, &tree_a, &[&c1]);
    let c2b = commit(&mut s.db, &tree_b, &[&c1]);

    let base = tree_with_modes(&mut s.db, &[("mod", &c1, FileMode::GITLINK)]);
    let side1 = tree_with_modes(&mut s.db, &[("mod", &c2a, FileMode::GITLINK)]);
    let side2 = tree_with_modes(&mut s.db, &[("mod", &c2b, FileMode::GITLINK)]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    assert!(outcome.output.contains("CONFLICT (submodule)"));
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["mod"], ("160000".to_string(), c2a));
}

#[test]
fn symlink_conflict_keeps_side1_target() {
    let mut s = scratch();
    let t1 = blob(&mut s.db, "target1");
    let t2 = blob(&mut s.db, "target2");
    let base = tree(&mut s.db, &[]);
    let side1 = tree_with_modes(&mut s.db, &[("link", &t1, FileMode::SYMLINK)]);
    let side2 = tree_with_modes(&mut s.db, &[("link", &t2, FileMode::SYMLINK)]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["link"], ("120000".to_string(), "target1".to_string()));
}

#[test]
fn mixed_types_keep_the_regular_file() {
    let mut s = scratch();
    let file_blob = blob(&mut s.db, "data\n");
    let link_blob = blob(&mut s.db, "target");
    let base = tree(&mut s.db, &[]);
    let side1 = tree_with_modes(&mut s.db, &[("p", &file_blob, FileMode::REGULAR)]);
    let side2 = tree_with_modes(&mut s.db, &[("p", &link_blob, FileMode::SYMLINK)]);

    let mut merge = Merge::new(&mut s.db, options());
    let outcome = merge.merge_trees(&side1, &side2, &base).unwrap();

    assert!(!outcome.clean);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["p"], ("100644".to_string(), "data\n".to_string()));
}

#[test]
fn subtree_shift_aligns_other_side() {
    let mut s = scratch();
    // head carries the subproject under vendor/lib; the other side is the
    // subproject's own root
    let head = tree(&mut s.db, &[("vendor/lib/f", "1\n"), ("top", "t\n")]);
    let other = tree(&mut s.db, &[("f", "2\n")]);
    let base = tree(&mut s.db, &[("f", "1\n")]);

    let opts = MergeOptions {
        subtree_shift: Some("vendor/lib".to_string()),
        ..options()
    };
    let mut merge = Merge::new(&mut s.db, opts);
    let outcome = merge.merge_trees(&head, &other, &base).unwrap();

    assert!(outcome.clean, "unmerged: {:?}", outcome.unmerged);
    let files = flatten(&mut s.db, &outcome.result_tree);
    assert_eq!(files["vendor/lib/f"].1, "2\n");
    assert_eq!(files["top"].1, "t\n");
}
