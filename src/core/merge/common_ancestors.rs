use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::database::commit::Commit;
use crate::core::database::database::{Database, GitObject};
use crate::errors::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Parent1,
    Parent2,
    Result,
    Stale,
}

/// Paint-down-to-common walk over the commit graph: commits reachable from
/// `one` carry Parent1, commits reachable from the `twos` carry Parent2, and
/// commits reached by both are candidate common ancestors. Ancestors of a
/// candidate are marked stale so only the frontier survives.
pub struct CommonAncestors<'a> {
    database: &'a mut Database,
    flags: HashMap<String, HashSet<Flag>>,
    queue: VecDeque<String>,
    results: VecDeque<String>,
}

impl<'a> CommonAncestors<'a> {
    pub fn new(database: &'a mut Database, one: &str, twos: &[&str]) -> Result<Self, Error> {
        let mut queue = VecDeque::new();
        let mut flags: HashMap<String, HashSet<Flag>> = HashMap::new();

        database.load(one)?;
        queue.push_back(one.to_string());
        flags
            .entry(one.to_string())
            .or_default()
            .insert(Flag::Parent1);

        for two in twos {
            database.load(two)?;
            queue.push_back(two.to_string());
            flags
                .entry(two.to_string())
                .or_default()
                .insert(Flag::Parent2);
        }

        Ok(Self {
            database,
            flags,
            queue,
            results: VecDeque::new(),
        })
    }

    pub fn find(&mut self) -> Result<Vec<String>, Error> {
        while !self.all_stale() {
            let commit_oid = match self.queue.pop_front() {
                Some(oid) => oid,
                None => break,
            };

            let commit_obj = self.database.load(&commit_oid)?;
            let commit = match commit_obj.as_any().downcast_ref::<Commit>() {
                Some(commit) => commit,
                None => continue,
            };

            let flags = self.flags.get(&commit_oid).unwrap().clone();
            let is_common = flags.contains(&Flag::Parent1) && flags.contains(&Flag::Parent2);

            if is_common && !flags.contains(&Flag::Result) {
                self.flags
                    .get_mut(&commit_oid)
                    .unwrap()
                    .insert(Flag::Result);
                self.results.push_back(commit_oid.clone());

                let mut propagated = flags.clone();
                propagated.insert(Flag::Stale);
                self.add_parents(commit, &propagated);
            } else {
                self.add_parents(commit, &flags);
            }
        }

        let mut result = Vec::new();
        for oid in &self.results {
            if !self.is_marked(oid, &Flag::Stale) {
                result.push(oid.clone());
            }
        }

        Ok(result)
    }

    pub fn is_marked(&self, oid: &str, flag: &Flag) -> bool {
        self.flags
            .get(oid)
            .map_or(false, |flags| flags.contains(flag))
    }

    fn all_stale(&self) -> bool {
        self.queue
            .iter()
            .all(|oid| self.is_marked(oid, &Flag::Stale))
    }

    fn add_parents(&mut self, commit: &Commit, flags: &HashSet<Flag>) {
        for parent_oid in commit.get_parents() {
            let current_flags = self.flags.entry(parent_oid.to_string()).or_default();

            let mut new_flags_added = false;
            for flag in flags {
                if current_flags.insert(flag.clone()) {
                    new_flags_added = true;
                }
            }

            if new_flags_added {
                self.queue.push_back(parent_oid.to_string());
            }
        }
    }
}

/// True when `ancestor` is reachable from `descendant` (inclusive).
pub fn is_ancestor(database: &mut Database, ancestor: &str, descendant: &str) -> Result<bool, Error> {
    if ancestor == descendant {
        return Ok(true);
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(descendant.to_string());

    while let Some(oid) = queue.pop_front() {
        if !seen.insert(oid.clone()) {
            continue;
        }
        if oid == ancestor {
            return Ok(true);
        }
        let obj = self_load_commit(database, &oid)?;
        if let Some(commit) = obj {
            for parent in commit.get_parents() {
                queue.push_back(parent.clone());
            }
        }
    }

    Ok(false)
}

fn self_load_commit(database: &mut Database, oid: &str) -> Result<Option<Commit>, Error> {
    let obj = database.load(oid)?;
    Ok(obj.as_any().downcast_ref::<Commit>().cloned())
}

/// Merge commits anywhere in the object store that contain both `a` and
/// `b`. Used to suggest existing submodule merges; nothing is synthesized.
pub fn find_merges_containing(
    database: &mut Database,
    a: &str,
    b: &str,
) -> Result<Vec<String>, Error> {
    let mut result = Vec::new();
    for oid in database.list_object_ids()? {
        let is_merge = match self_load_commit(database, &oid) {
            Ok(Some(commit)) => commit.get_parents().len() >= 2,
            _ => false,
        };
        if is_merge && is_ancestor(database, a, &oid)? && is_ancestor(database, b, &oid)? {
            result.push(oid);
        }
    }
    result.sort();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::author::Author;
    use crate::core::database::commit::Commit;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("objects"));
        (dir, db)
    }

    fn commit(db: &mut Database, parents: &[&str], message: &str) -> String {
        let author = Author::parse("Test <test@example.com> 1700000000 +0000").unwrap();
        let mut commit = Commit::new(
            parents.iter().map(|p| p.to_string()).collect(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904".to_string(),
            author,
            message.to_string(),
        );
        db.store(&mut commit).unwrap()
    }

    #[test]
    fn single_base_for_simple_fork() {
        let (_dir, mut db) = scratch();
        let root = commit(&mut db, &[], "root");
        let left = commit(&mut db, &[&root], "left");
        let right = commit(&mut db, &[&root], "right");

        let mut walk = CommonAncestors::new(&mut db, &left, &[&right]).unwrap();
        assert_eq!(walk.find().unwrap(), vec![root]);
    }

    #[test]
    fn stale_ancestors_are_filtered() {
        let (_dir, mut db) = scratch();
        let root = commit(&mut db, &[], "root");
        let mid = commit(&mut db, &[&root], "mid");
        let left = commit(&mut db, &[&mid], "left");
        let right = commit(&mut db, &[&mid], "right");

        let mut walk = CommonAncestors::new(&mut db, &left, &[&right]).unwrap();
        assert_eq!(walk.find().unwrap(), vec![mid]);
    }

    #[test]
    fn reachability() {
        let (_dir, mut db) = scratch();
        let root = commit(&mut db, &[], "root");
        let child = commit(&mut db, &[&root], "child");
        let other = commit(&mut db, &[], "unrelated");

        assert!(is_ancestor(&mut db, &root, &child).unwrap());
        assert!(!is_ancestor(&mut db, &child, &root).unwrap());
        assert!(is_ancestor(&mut db, &other, &other).unwrap());
        assert!(!is_ancestor(&mut db, &other, &child).unwrap());
    }

    #[test]
    fn merges_containing_both_sides_are_found() {
        let (_dir, mut db) = scratch();
        let root = commit(&mut db, &[], "root");
        let a = commit(&mut db, &[&root], "a");
        let b = commit(&mut db, &[&root], "b");
        let merge = commit(&mut db, &[&a, &b], "merge");

        let found = find_merges_containing(&mut db, &a, &b).unwrap();
        assert_eq!(found, vec![merge]);
    }
}
