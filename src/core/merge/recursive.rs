use std::collections::HashSet;
use std::rc::Rc;

use crate::core::database::author::Author;
use crate::core::database::commit::Commit;
use crate::core::database::database::{Database, GitObject};
use crate::core::database::tree::{Tree, TreeEntry};
use crate::core::interner::PathInterner;
use crate::core::merge::bases::Bases;
use crate::core::merge::options::MergeOptions;
use crate::core::merge::path_info::{PathEntry, PathMap, UnmergedEntry};
use crate::errors::error::Error;

/// What a finished merge hands back: cleanliness, the id of the result tree
/// (produced even when unclean, with conflict markers embedded), the
/// unmerged paths with their stages, and the buffered diagnostic log.
#[derive(Debug)]
pub struct MergeOutcome {
    pub clean: bool,
    pub result_tree: String,
    pub unmerged: Vec<UnmergedEntry>,
    pub needed_rename_limit: usize,
    pub output: String,
}

/// The merge engine. One instance runs one top-level merge; the recursion
/// driver reuses it for folding multiple merge bases, resetting the per-run
/// path state between tree merges.
pub struct Merge<'a> {
    pub(crate) database: &'a mut Database,
    pub(crate) opt: MergeOptions,
    pub(crate) paths: PathMap,
    pub(crate) unmerged: Vec<String>,
    pub(crate) possible_dir_rename_bases: HashSet<String>,
    pub(crate) interner: PathInterner,
    pub(crate) call_depth: usize,
    pub(crate) needed_rename_limit: usize,
    pub(crate) obuf: String,
    pub(crate) current_dir_name: Rc<str>,
    pub(crate) inside_possibly_renamed_dir: bool,
}

impl<'a> Merge<'a> {
    pub fn new(database: &'a mut Database, opt: MergeOptions) -> Self {
        let mut interner = PathInterner::new();
        let root = interner.intern("");
        Merge {
            database,
            opt,
            paths: PathMap::new(),
            unmerged: Vec::new(),
            possible_dir_rename_bases: HashSet::new(),
            interner,
            call_depth: 0,
            needed_rename_limit: 0,
            obuf: String::new(),
            current_dir_name: root,
            inside_possibly_renamed_dir: false,
        }
    }

    /// Single-level merge of two trees against an already-chosen base tree.
    pub fn merge_trees(
        &mut self,
        head_tree: &str,
        other_tree: &str,
        base_tree: &str,
    ) -> Result<MergeOutcome, Error> {
        self.opt.validate()?;
        let (clean, result_tree) = self.merge_trees_internal(head_tree, other_tree, base_tree)?;
        Ok(self.finalize(clean, result_tree))
    }

    /// Recursive merge of two commits. Merge bases are computed unless
    /// supplied; more than one base is folded into a virtual base first.
    pub fn merge_commits(
        &mut self,
        h1: &str,
        h2: &str,
        merge_bases: Option<Vec<String>>,
    ) -> Result<MergeOutcome, Error> {
        self.opt.validate()?;
        let (clean, result_tree) = self.merge_commits_internal(h1, h2, merge_bases)?;
        Ok(self.finalize(clean, result_tree))
    }

    fn merge_commits_internal(
        &mut self,
        h1: &str,
        h2: &str,
        merge_bases: Option<Vec<String>>,
    ) -> Result<(bool, String), Error> {
        if self.show(4) {
            self.output(4, "Merging:".to_string());
            let t1 = self.commit_title(h1);
            self.output(4, t1);
            let t2 = self.commit_title(h2);
            self.output(4, t2);
        }

        let mut bases = match merge_bases {
            Some(bases) => bases,
            None => {
                let mut found = Bases::new(self.database).find(h1, h2)?;
                found.sort();
                found
            }
        };

        if self.show(5) {
            let msg = format!("found {} common ancestor(s):", bases.len());
            self.output(5, msg);
            for base in &bases {
                let title = self.commit_title(base);
                self.output(5, title);
            }
        }

        let ancestor_label;
        let mut merged_base = if bases.is_empty() {
            // No common history: merge against the empty tree.
            let mut empty = Tree::new();
            let tree_oid = self.database.store_in_memory(&mut empty);
            let mut virtual_commit = Commit::new(
                Vec::new(),
                tree_oid,
                Self::virtual_author(),
                "ancestor".to_string(),
            );
            ancestor_label = "empty tree".to_string();
            self.database.store_in_memory(&mut virtual_commit)
        } else {
            let first = bases.remove(0);
            ancestor_label = if self.opt.ancestor.is_some() && self.call_depth == 0 {
                self.opt.ancestor.clone().unwrap()
            } else if !bases.is_empty() {
                "merged common ancestors".to_string()
            } else {
                self.database.short_oid(&first)
            };
            first
        };

        for ancestor in bases {
            self.call_depth += 1;
            let saved_b1 = std::mem::replace(
                &mut self.opt.branch1,
                "Temporary merge branch 1".to_string(),
            );
            let saved_b2 = std::mem::replace(
                &mut self.opt.branch2,
                "Temporary merge branch 2".to_string(),
            );

            // Cleanness of intermediate merges is ignored; their conflict
            // markers become part of the virtual base's content.
            let (_, folded_tree) = self.merge_commits_internal(&merged_base, &ancestor, None)?;

            self.opt.branch1 = saved_b1;
            self.opt.branch2 = saved_b2;
            self.call_depth -= 1;

            let mut virtual_commit = Commit::new(
                vec![merged_base.clone(), ancestor.clone()],
                folded_tree,
                Self::virtual_author(),
                "merged tree".to_string(),
            );
            merged_base = self.database.store_in_memory(&mut virtual_commit);
        }

        let saved_ancestor = self.opt.ancestor.replace(ancestor_label);
        let t1 = self.database.tree_oid_of(h1)?;
        let t2 = self.database.tree_oid_of(h2)?;
        let tb = self.database.tree_oid_of(&merged_base)?;
        let result = self.merge_trees_internal(&t1, &t2, &tb)?;
        self.opt.ancestor = saved_ancestor;

        Ok(result)
    }

    pub(crate) fn merge_trees_internal(
        &mut self,
        head_tree: &str,
        other_tree: &str,
        base_tree: &str,
    ) -> Result<(bool, String), Error> {
        self.reset_run_state();

        let (other_tree, base_tree) = match self.opt.subtree_shift.clone() {
            Some(prefix) => (
                self.shift_tree(other_tree, &prefix)?,
                self.shift_tree(base_tree, &prefix)?,
            ),
            None => (other_tree.to_string(), base_tree.to_string()),
        };

        if base_tree == other_tree {
            self.output(0, "Already up to date!".to_string());
            return Ok((true, head_tree.to_string()));
        }

        self.collect_merge_info(&base_tree, head_tree, &other_tree)?;

        if self.opt.detect_renames {
            self.detect_and_process_renames(&base_tree, head_tree, &other_tree)?;
        }

        let result_tree = self.process_entries()?;
        let clean = self.unmerged.is_empty();
        Ok((clean, result_tree))
    }

    fn reset_run_state(&mut self) {
        self.paths = PathMap::new();
        self.unmerged = Vec::new();
        self.possible_dir_rename_bases = HashSet::new();
        self.current_dir_name = self.interner.intern("");
        self.inside_possibly_renamed_dir = false;
    }

    /// Re-root a tree under `prefix`, so a subproject tree lines up with the
    /// location it occupies in head.
    fn shift_tree(&mut self, tree_oid: &str, prefix: &str) -> Result<String, Error> {
        let mut oid = tree_oid.to_string();
        for component in prefix.split('/').rev() {
            let mut wrapper = Tree::new();
            let mut subtree = Tree::new();
            subtree.set_oid(oid);
            wrapper.insert_entry(component.to_string(), TreeEntry::Tree(Box::new(subtree)));
            oid = self.database.store(&mut wrapper)?;
        }
        Ok(oid)
    }

    fn finalize(&mut self, clean: bool, result_tree: String) -> MergeOutcome {
        if self.needed_rename_limit > 0 {
            let msg = format!(
                "Inexact rename detection was skipped because there were too many files; \
                 a rename limit of at least {} is needed",
                self.needed_rename_limit
            );
            self.output(1, msg);
        }

        let mut unmerged_paths: Vec<String> = Vec::new();
        for path in &self.unmerged {
            if !unmerged_paths.contains(path) {
                unmerged_paths.push(path.clone());
            }
        }
        unmerged_paths.sort();

        let mut unmerged = Vec::new();
        for path in unmerged_paths {
            if let Some(PathEntry::Conflict(ci)) = self.paths.get(&path) {
                let mut stage_paths = [None, None, None];
                let mut stages = [None, None, None];
                for i in 0..3 {
                    if let Some(vi) = &ci.stages[i] {
                        stage_paths[i] = Some(ci.pathnames[i].to_string());
                        stages[i] = Some((vi.mode.to_octal_string(), vi.oid.clone()));
                    }
                }
                unmerged.push(UnmergedEntry {
                    path,
                    stage_paths,
                    stages,
                });
            }
        }

        let output = if self.opt.buffer_output >= 2 {
            std::mem::take(&mut self.obuf)
        } else {
            if !self.obuf.is_empty() {
                print!("{}", self.obuf);
                self.obuf.clear();
            }
            String::new()
        };

        MergeOutcome {
            clean,
            result_tree,
            unmerged,
            needed_rename_limit: self.needed_rename_limit,
            output,
        }
    }

    pub(crate) fn show(&self, v: u8) -> bool {
        (self.call_depth == 0 && self.opt.verbosity >= v) || self.opt.verbosity >= 5
    }

    /// Append a diagnostic line, indented by recursion depth. With
    /// buffer_output == 0 lines go straight to stdout.
    pub(crate) fn output(&mut self, v: u8, msg: String) {
        if !self.show(v) {
            return;
        }
        let line = format!("{}{}\n", "  ".repeat(self.call_depth), msg);
        if self.opt.buffer_output == 0 {
            print!("{}", line);
        } else {
            self.obuf.push_str(&line);
        }
    }

    pub(crate) fn branch_label(&self, side: usize) -> String {
        if side == 1 {
            self.opt.branch1.clone()
        } else {
            self.opt.branch2.clone()
        }
    }

    fn commit_title(&mut self, oid: &str) -> String {
        let short = self.database.short_oid(oid);
        match self.database.load(oid) {
            Ok(obj) => match obj.as_any().downcast_ref::<Commit>() {
                Some(commit) => format!("{} {}", short, commit.title_line()),
                None => format!("{} (bad commit)", short),
            },
            Err(_) => format!("{} (bad commit)", short),
        }
    }

    fn virtual_author() -> Author {
        Author::new("virtual merge".to_string(), "merge@localhost".to_string())
    }
}
