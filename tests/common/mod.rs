use std::collections::BTreeMap;

use tempfile::TempDir;

use mergeflow::core::database::author::Author;
use mergeflow::core::database::blob::Blob;
use mergeflow::core::database::commit::Commit;
use mergeflow::core::database::database::{Database, GitObject};
use mergeflow::core::database::entry::DatabaseEntry;
use mergeflow::core::database::tree::{Tree, TreeEntry};
use mergeflow::core::file_mode::FileMode;
use mergeflow::core::merge::MergeOptions;

pub struct Scratch {
    pub dir: TempDir,
    pub db: Database,
}

pub fn scratch() -> Scratch {
    let dir = TempDir::new().unwrap();
    let db = Database::new(dir.path().join("objects"));
    Scratch { dir, db }
}

pub fn blob(db: &mut Database, content: &str) -> String {
    let mut blob = Blob::new(content.as_bytes().to_vec());
    db.store(&mut blob).unwrap()
}

/// Build and store a tree from (path, content) pairs; nested paths create
/// subtrees.
pub fn tree(db: &mut Database, files: &[(&str, &str)]) -> String {
    let entries: Vec<DatabaseEntry> = files
        .iter()
        .map(|(path, content)| {
            let oid = blob(db, content);
            DatabaseEntry::new(path.to_string(), oid, "100644")
        })
        .collect();
    store_tree(db, &entries)
}

/// Like `tree`, but every entry carries an explicit mode and oid.
pub fn tree_with_modes(db: &mut Database, entries: &[(&str, &str, FileMode)]) -> String {
    let entries: Vec<DatabaseEntry> = entries
        .iter()
        .map(|(path, oid, mode)| {
            DatabaseEntry::new(path.to_string(), oid.to_string(), &mode.to_octal_string())
        })
        .collect();
    store_tree(db, &entries)
}

fn store_tree(db: &mut Database, entries: &[DatabaseEntry]) -> String {
    let mut tree = Tree::build(entries.iter()).unwrap();
    let mut oid = String::new();
    tree.traverse(&mut |t| {
        oid = db.store(t)?;
        Ok(())
    })
    .unwrap();
    oid
}

pub fn commit(db: &mut Database, tree_oid: &str, parents: &[&str]) -> String {
    let author = Author::parse("Test <test@example.com> 1700000000 +0000").unwrap();
    let mut commit = Commit::new(
        parents.iter().map(|p| p.to_string()).collect(),
        tree_oid.to_string(),
        author,
        "test commit".to_string(),
    );
    db.store(&mut commit).unwrap()
}

/// Flatten a tree to path -> (octal mode, blob content). Submodule entries
/// keep their commit id as the "content".
pub fn flatten(db: &mut Database, tree_oid: &str) -> BTreeMap<String, (String, String)> {
    let mut result = BTreeMap::new();
    flatten_into(db, tree_oid, "", &mut result);
    result
}

fn flatten_into(
    db: &mut Database,
    tree_oid: &str,
    prefix: &str,
    result: &mut BTreeMap<String, (String, String)>,
) {
    let obj = db.load(tree_oid).unwrap();
    let tree = obj.as_any().downcast_ref::<Tree>().unwrap().clone();
    for (name, entry) in tree.get_entries() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        match entry {
            TreeEntry::Tree(subtree) => {
                flatten_into(db, subtree.get_oid().unwrap(), &path, result);
            }
            TreeEntry::Blob(oid, mode) => {
                if mode.is_directory() {
                    flatten_into(db, oid, &path, result);
                } else if mode.is_gitlink() {
                    result.insert(path, (mode.to_octal_string(), oid.clone()));
                } else {
                    let content =
                        String::from_utf8_lossy(&db.read_blob_bytes(oid).unwrap()).to_string();
                    result.insert(path, (mode.to_octal_string(), content));
                }
            }
        }
    }
}

pub fn options() -> MergeOptions {
    MergeOptions {
        branch1: "main".to_string(),
        branch2: "feature".to_string(),
        buffer_output: 2,
        ..MergeOptions::default()
    }
}
