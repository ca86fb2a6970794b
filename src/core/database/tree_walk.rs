use std::collections::BTreeMap;

use crate::core::database::database::Database;
use crate::core::database::entry::DatabaseEntry;
use crate::errors::error::Error;

/// Which slot holds which tree during a three-way walk.
pub const MBASE: usize = 0;
pub const SIDE1: usize = 1;
pub const SIDE2: usize = 2;

/// One name visited by the walk: the three per-tree entries (absent sides
/// are `None`), a presence bitmask and a directory bitmask. Bit i describes
/// slot i; the two masks are disjoint for a given side.
#[derive(Debug)]
pub struct WalkedName {
    pub names: [Option<DatabaseEntry>; 3],
    pub mask: u8,
    pub dirmask: u8,
}

impl WalkedName {
    pub fn entry(&self, side: usize) -> Option<&DatabaseEntry> {
        self.names[side].as_ref()
    }
}

/// Walk one level of up to three trees in lock step, yielding every name
/// present in any of them in lexicographic order. Recursion into
/// subdirectories is the caller's decision, which lets the collector skip
/// identical subtrees entirely.
pub fn walk_level(
    database: &mut Database,
    oids: [Option<&str>; 3],
) -> Result<Vec<(String, WalkedName)>, Error> {
    let mut levels: [BTreeMap<String, DatabaseEntry>; 3] =
        [BTreeMap::new(), BTreeMap::new(), BTreeMap::new()];
    for (i, oid) in oids.iter().enumerate() {
        levels[i] = database.tree_entries(*oid)?;
    }

    let mut names: Vec<String> = Vec::new();
    for level in &levels {
        for name in level.keys() {
            names.push(name.clone());
        }
    }
    names.sort();
    names.dedup();

    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let mut walked = WalkedName {
            names: [None, None, None],
            mask: 0,
            dirmask: 0,
        };
        for i in 0..3 {
            if let Some(entry) = levels[i].get(&name) {
                walked.mask |= 1 << i;
                if entry.get_file_mode().is_directory() {
                    walked.dirmask |= 1 << i;
                }
                walked.names[i] = Some(entry.clone());
            }
        }
        result.push((name, walked));
    }

    Ok(result)
}

/// Bits of `mask` that are files rather than directories.
pub fn filemask_of(walked: &WalkedName) -> u8 {
    walked.mask & !walked.dirmask
}
