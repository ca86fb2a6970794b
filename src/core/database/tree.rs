use super::database::GitObject;
use crate::core::database::entry::DatabaseEntry;
use crate::core::file_mode::FileMode;
use crate::errors::error::Error;
use itertools::Itertools;
use std::any::Any;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Tree {
    oid: Option<String>,
    entries: HashMap<String, TreeEntry>,
}

#[derive(Debug, Clone)]
pub enum TreeEntry {
    Blob(String, FileMode),
    Tree(Box<Tree>),
}

impl GitObject for Tree {
    fn get_type(&self) -> &str {
        "tree"
    }

    /// Serialize in the wire format: "<octal mode> <name>\0" followed by the
    /// 20 raw oid bytes, entries sorted by name.
    fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::new();

        for (name, entry) in self.entries.iter().sorted_by_key(|(name, _)| *name) {
            let (oid, mode) = match entry {
                TreeEntry::Blob(oid, mode) => (oid.as_str(), *mode),
                TreeEntry::Tree(subtree) => (
                    subtree.oid.as_deref().unwrap_or(""),
                    FileMode::DIRECTORY,
                ),
            };

            let entry_header = format!("{} {}\0", mode.to_octal_string(), name);
            result.extend_from_slice(entry_header.as_bytes());

            match hex::decode(oid) {
                Ok(oid_bytes) if oid_bytes.len() == 20 => result.extend_from_slice(&oid_bytes),
                _ => result.extend_from_slice(&[0; 20]),
            }
        }

        result
    }

    fn set_oid(&mut self, oid: String) {
        self.oid = Some(oid);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn GitObject> {
        Box::new(self.clone())
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            oid: None,
            entries: HashMap::new(),
        }
    }

    pub fn get_oid(&self) -> Option<&String> {
        self.oid.as_ref()
    }

    pub fn get_entries(&self) -> &HashMap<String, TreeEntry> {
        &self.entries
    }

    pub fn insert_entry(&mut self, name: String, entry: TreeEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get_entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Build a nested tree from flat entries whose names are full paths.
    pub fn build<'a, I>(entries: I) -> Result<Self, Error>
    where
        I: Iterator<Item = &'a DatabaseEntry>,
    {
        let mut root = Tree::new();

        for entry in entries {
            let components: Vec<&str> = entry.get_name().split('/').collect();
            let (filename, dirs) = components.split_last().unwrap();

            let mut current = &mut root;
            for dir in dirs {
                let existing_is_blob = matches!(
                    current.entries.get(*dir),
                    Some(TreeEntry::Blob(_, mode)) if !mode.is_directory()
                );
                if existing_is_blob {
                    return Err(Error::Generic(format!(
                        "Path conflict: '{}' exists as a file but is used as a directory in '{}'",
                        dir,
                        entry.get_name()
                    )));
                }
                current = match current
                    .entries
                    .entry(dir.to_string())
                    .or_insert_with(|| TreeEntry::Tree(Box::new(Tree::new())))
                {
                    TreeEntry::Tree(subtree) => subtree,
                    TreeEntry::Blob(..) => unreachable!("checked above"),
                };
            }

            current.entries.insert(
                filename.to_string(),
                TreeEntry::Blob(entry.get_oid().to_string(), entry.get_file_mode()),
            );
        }

        Ok(root)
    }

    /// Visit subtrees bottom-up, then this tree. Used to store a freshly
    /// built tree: the callback assigns each subtree its oid before the
    /// parent serializes.
    pub fn traverse<F>(&mut self, func: &mut F) -> Result<(), Error>
    where
        F: FnMut(&mut Tree) -> Result<(), Error>,
    {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            if let Some(TreeEntry::Tree(subtree)) = self.entries.get_mut(&name) {
                subtree.traverse(func)?;
            }
        }
        func(self)
    }

    /// Parse a tree from its binary representation.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut tree = Tree::new();
        let mut pos = 0;

        while pos < data.len() {
            let space_pos = data[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| {
                    Error::InvalidObject("Invalid tree format: missing space after mode".to_string())
                })?;
            let mode_str = std::str::from_utf8(&data[pos..pos + space_pos])
                .map_err(|_| Error::InvalidObject("Invalid UTF-8 in mode".to_string()))?;
            let mode = FileMode::parse(mode_str);
            pos += space_pos + 1;

            let null_pos = data[pos..].iter().position(|&b| b == 0).ok_or_else(|| {
                Error::InvalidObject(
                    "Invalid tree format: missing null terminator after name".to_string(),
                )
            })?;
            let name = std::str::from_utf8(&data[pos..pos + null_pos])
                .map_err(|_| Error::InvalidObject("Invalid UTF-8 in name".to_string()))?;
            pos += null_pos + 1;

            if pos + 20 > data.len() {
                return Err(Error::InvalidObject(
                    "Invalid tree format: truncated object id".to_string(),
                ));
            }
            let oid = hex::encode(&data[pos..pos + 20]);
            pos += 20;

            if mode.is_directory() {
                let mut subtree = Tree::new();
                subtree.set_oid(oid);
                tree.entries
                    .insert(name.to_string(), TreeEntry::Tree(Box::new(subtree)));
            } else {
                tree.entries
                    .insert(name.to_string(), TreeEntry::Blob(oid, mode));
            }
        }

        Ok(tree)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
