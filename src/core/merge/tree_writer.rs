use std::rc::Rc;

use crate::core::database::database::Database;
use crate::core::database::tree::{Tree, TreeEntry};
use crate::core::file_mode::FileMode;
use crate::core::merge::path_info::{PathMap, VersionInfo};
use crate::errors::error::Error;

/// Bottom-up tree builder fed by reverse-sorted path iteration: a stack of
/// (basename, version) entries plus a stack of (directory, start offset)
/// frames. When iteration leaves a directory, its slice of entries becomes
/// a tree object and the id lands in the directory's own path-map entry.
pub(crate) struct DirectoryVersions {
    versions: Vec<(String, VersionInfo)>,
    offsets: Vec<(Rc<str>, usize)>,
    last_directory: Rc<str>,
}

fn dir_contains(parent: &str, child: &str) -> bool {
    parent.is_empty()
        || (child.len() > parent.len()
            && child.starts_with(parent)
            && child.as_bytes()[parent.len()] == b'/')
}

impl DirectoryVersions {
    pub fn new(root: Rc<str>) -> Self {
        DirectoryVersions {
            versions: Vec::new(),
            offsets: vec![(root.clone(), 0)],
            last_directory: root,
        }
    }

    /// Account for the next entry living in `new_dir`: open a frame when
    /// descending, close finished frames when ascending. Directory names
    /// are interned, so identity comparison is enough.
    pub fn change_directory(
        &mut self,
        database: &mut Database,
        paths: &mut PathMap,
        new_dir: Rc<str>,
    ) -> Result<(), Error> {
        if Rc::ptr_eq(&new_dir, &self.last_directory) {
            return Ok(());
        }

        if dir_contains(&self.last_directory, &new_dir) {
            self.offsets.push((new_dir.clone(), self.versions.len()));
            self.last_directory = new_dir;
            return Ok(());
        }

        loop {
            self.close_frame(database, paths)?;
            if Rc::ptr_eq(&self.last_directory, &new_dir) {
                return Ok(());
            }
            if dir_contains(&self.last_directory, &new_dir) {
                self.offsets.push((new_dir.clone(), self.versions.len()));
                self.last_directory = new_dir;
                return Ok(());
            }
        }
    }

    /// Emit the tree for the deepest open directory and store its id in the
    /// directory's path-map entry. A directory with no surviving entries is
    /// marked null so its parent omits it.
    fn close_frame(&mut self, database: &mut Database, paths: &mut PathMap) -> Result<(), Error> {
        let (dir, offset) = self
            .offsets
            .pop()
            .ok_or_else(|| Error::Generic("directory frame stack underflow".to_string()))?;
        let slice = self.versions.split_off(offset);

        let entry = paths.get_mut(&*dir).ok_or_else(|| {
            Error::Generic(format!("no path entry for completed directory {}", dir))
        })?;
        let mi = entry.merged_mut();

        if slice.is_empty() {
            mi.result = None;
            mi.is_null = true;
        } else {
            let oid = write_tree(database, &slice)?;
            mi.result = Some(VersionInfo {
                mode: FileMode::DIRECTORY,
                oid,
            });
            mi.is_null = false;
        }

        self.last_directory = self
            .offsets
            .last()
            .map(|(dir, _)| dir.clone())
            .ok_or_else(|| Error::Generic("directory frame stack underflow".to_string()))?;
        Ok(())
    }

    /// Append one resolved entry to the open directory. Null results are
    /// omitted from trees.
    pub fn record(&mut self, basename: &str, info: Option<VersionInfo>) {
        if let Some(vi) = info {
            self.versions.push((basename.to_string(), vi));
        }
    }

    /// Collapse whatever is still open down to the root and emit the root
    /// tree.
    pub fn finish(mut self, database: &mut Database, paths: &mut PathMap) -> Result<String, Error> {
        while self.offsets.len() > 1 {
            self.close_frame(database, paths)?;
        }
        write_tree(database, &self.versions)
    }
}

fn write_tree(database: &mut Database, entries: &[(String, VersionInfo)]) -> Result<String, Error> {
    let mut tree = Tree::new();
    for (name, vi) in entries {
        tree.insert_entry(name.clone(), TreeEntry::Blob(vi.oid.clone(), vi.mode));
    }
    database.store(&mut tree)
}
