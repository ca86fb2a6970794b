use std::collections::BTreeMap;

use crate::core::database::database::Database;
use crate::core::database::entry::DatabaseEntry;
use crate::errors::error::Error;

type Change = (Option<DatabaseEntry>, Option<DatabaseEntry>);

/// Recursive diff of two trees down to individual files. Unlike a
/// single-level walk, whole added or deleted directories are expanded so a
/// rename source in a vanished directory can still be paired with its
/// destination elsewhere.
pub struct TreeDiff<'a> {
    database: &'a mut Database,
    pub changes: BTreeMap<String, Change>,
}

impl<'a> TreeDiff<'a> {
    pub fn new(database: &'a mut Database) -> Self {
        TreeDiff {
            database,
            changes: BTreeMap::new(),
        }
    }

    pub fn compare_oids(&mut self, a: Option<&str>, b: Option<&str>) -> Result<(), Error> {
        self.compare("", a, b)
    }

    fn compare(&mut self, prefix: &str, a: Option<&str>, b: Option<&str>) -> Result<(), Error> {
        if a == b {
            return Ok(());
        }

        let a_entries = self.database.tree_entries(a)?;
        let b_entries = self.database.tree_entries(b)?;

        let mut names: Vec<&String> = a_entries.keys().chain(b_entries.keys()).collect();
        names.sort();
        names.dedup();

        for name in names {
            let a_entry = a_entries.get(name);
            let b_entry = b_entries.get(name);

            if a_entry == b_entry {
                continue;
            }

            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            let a_is_dir = a_entry.map_or(false, |e| e.get_file_mode().is_directory());
            let b_is_dir = b_entry.map_or(false, |e| e.get_file_mode().is_directory());

            if a_is_dir || b_is_dir {
                let a_sub = a_entry.filter(|_| a_is_dir).map(|e| e.get_oid().to_string());
                let b_sub = b_entry.filter(|_| b_is_dir).map(|e| e.get_oid().to_string());
                let a_file = a_entry.filter(|_| !a_is_dir).cloned();
                let b_file = b_entry.filter(|_| !b_is_dir).cloned();

                self.compare(&path, a_sub.as_deref(), b_sub.as_deref())?;

                if a_file.is_some() || b_file.is_some() {
                    self.changes.insert(path, (a_file, b_file));
                }
            } else {
                self.changes
                    .insert(path, (a_entry.cloned(), b_entry.cloned()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::blob::Blob;
    use crate::core::database::tree::Tree;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("objects"));
        (dir, db)
    }

    fn store_flat_tree(db: &mut Database, files: &[(&str, &str)]) -> String {
        let entries: Vec<DatabaseEntry> = files
            .iter()
            .map(|(path, content)| {
                let mut blob = Blob::new(content.as_bytes().to_vec());
                let oid = db.store(&mut blob).unwrap();
                DatabaseEntry::new(path.to_string(), oid, "100644")
            })
            .collect();
        let mut tree = Tree::build(entries.iter()).unwrap();
        let mut oid = String::new();
        tree.traverse(&mut |t| {
            oid = db.store(t)?;
            Ok(())
        })
        .unwrap();
        oid
    }

    #[test]
    fn deleted_directory_expands_to_files() {
        let (_dir, mut db) = scratch();
        let a = store_flat_tree(&mut db, &[("d/x", "1"), ("d/y", "2"), ("keep", "3")]);
        let b = store_flat_tree(&mut db, &[("keep", "3")]);

        let mut diff = TreeDiff::new(&mut db);
        diff.compare_oids(Some(&a), Some(&b)).unwrap();

        let paths: Vec<&str> = diff.changes.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["d/x", "d/y"]);
        assert!(diff.changes["d/x"].0.is_some());
        assert!(diff.changes["d/x"].1.is_none());
    }

    #[test]
    fn file_replaced_by_directory_records_both_halves() {
        let (_dir, mut db) = scratch();
        let a = store_flat_tree(&mut db, &[("p", "file")]);
        let b = store_flat_tree(&mut db, &[("p/inner", "new")]);

        let mut diff = TreeDiff::new(&mut db);
        diff.compare_oids(Some(&a), Some(&b)).unwrap();

        assert!(diff.changes.contains_key("p"));
        assert!(diff.changes.contains_key("p/inner"));
        let (old_p, new_p) = &diff.changes["p"];
        assert!(old_p.is_some() && new_p.is_none());
    }
}
