use std::collections::HashSet;

use crate::core::database::database::Database;
use crate::core::merge::common_ancestors::{is_ancestor, CommonAncestors};
use crate::errors::error::Error;

/// Best common ancestors of two commits: the common ancestors that are not
/// themselves ancestors of another common ancestor. More than one surviving
/// base means a criss-cross history and triggers the recursive driver.
pub struct Bases<'a> {
    database: &'a mut Database,
    commits: Vec<String>,
    redundant: HashSet<String>,
}

impl<'a> Bases<'a> {
    pub fn new(database: &'a mut Database) -> Self {
        Self {
            database,
            commits: Vec::new(),
            redundant: HashSet::new(),
        }
    }

    pub fn find(&mut self, one: &str, two: &str) -> Result<Vec<String>, Error> {
        let mut common = CommonAncestors::new(self.database, one, &[two])?;
        let initial: Vec<String> = common.find()?;

        let mut unique: Vec<String> = Vec::new();
        for oid in initial {
            if !unique.contains(&oid) {
                unique.push(oid);
            }
        }
        self.commits = unique;

        if self.commits.len() <= 1 {
            return Ok(self.commits.clone());
        }

        self.redundant = HashSet::new();
        let candidates = self.commits.clone();
        for commit in &candidates {
            if self.redundant.contains(commit) {
                continue;
            }
            for other in &candidates {
                if other == commit || self.redundant.contains(other) {
                    continue;
                }
                if is_ancestor(self.database, commit, other)? {
                    self.redundant.insert(commit.clone());
                    break;
                }
            }
        }

        Ok(self
            .commits
            .iter()
            .filter(|commit| !self.redundant.contains(*commit))
            .cloned()
            .collect())
    }
}
