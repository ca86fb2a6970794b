use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::database::entry::DatabaseEntry;
use crate::core::file_mode::FileMode;

/// Stage indexes into the three-way arrays.
pub const MBASE: usize = 0;
pub const SIDE1: usize = 1;
pub const SIDE2: usize = 2;

/// One side's (mode, oid) at a path.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    pub mode: FileMode,
    pub oid: String,
}

impl VersionInfo {
    pub fn from_entry(entry: &DatabaseEntry) -> Self {
        VersionInfo {
            mode: entry.get_file_mode(),
            oid: entry.get_oid().to_string(),
        }
    }
}

/// The resolved half of a path entry. `result == None` with `is_null` set
/// means the path deliberately vanishes from the output tree.
#[derive(Debug, Clone)]
pub struct MergedInfo {
    pub result: Option<VersionInfo>,
    /// Containing directory, interned: equal directories share one
    /// allocation, so the tree writer compares by pointer.
    pub directory_name: Rc<str>,
    pub basename_offset: usize,
    pub is_null: bool,
    pub clean: bool,
}

impl MergedInfo {
    pub fn new(directory_name: Rc<str>, basename_offset: usize) -> Self {
        MergedInfo {
            result: None,
            directory_name,
            basename_offset,
            is_null: false,
            clean: false,
        }
    }
}

/// A path that could not be resolved during collection: the three staged
/// versions, their (possibly rename-divergent) pathnames, and the
/// classification masks driving the per-entry resolver.
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub merged: MergedInfo,
    pub stages: [Option<VersionInfo>; 3],
    pub pathnames: [Rc<str>; 3],
    pub df_conflict: bool,
    pub path_conflict: bool,
    /// Bit i: side i has this path as a file.
    pub filemask: u8,
    /// Bit i: side i has this path as a directory. Disjoint from filemask.
    pub dirmask: u8,
    /// 3 = base==side1, 5 = base==side2, 6 = sides match, 7 = all, 0 = none.
    pub match_mask: u8,
    /// Inputs of the eventual content merge are themselves merge results;
    /// widen the conflict markers one level.
    pub nested_content_merge: bool,
    pub processed: bool,
}

impl ConflictInfo {
    pub fn new(directory_name: Rc<str>, basename_offset: usize, pathname: Rc<str>) -> Self {
        ConflictInfo {
            merged: MergedInfo::new(directory_name, basename_offset),
            stages: [None, None, None],
            pathnames: [pathname.clone(), pathname.clone(), pathname],
            df_conflict: false,
            path_conflict: false,
            filemask: 0,
            dirmask: 0,
            match_mask: 0,
            nested_content_merge: false,
            processed: false,
        }
    }
}

/// What the path map holds for each visited path. Modeled as an explicit
/// tagged variant rather than the struct-prefix trick the masks came from.
#[derive(Debug, Clone)]
pub enum PathEntry {
    Merged(MergedInfo),
    Conflict(ConflictInfo),
}

impl PathEntry {
    pub fn merged(&self) -> &MergedInfo {
        match self {
            PathEntry::Merged(mi) => mi,
            PathEntry::Conflict(ci) => &ci.merged,
        }
    }

    pub fn merged_mut(&mut self) -> &mut MergedInfo {
        match self {
            PathEntry::Merged(mi) => mi,
            PathEntry::Conflict(ci) => &mut ci.merged,
        }
    }

    pub fn conflict(&self) -> Option<&ConflictInfo> {
        match self {
            PathEntry::Conflict(ci) => Some(ci),
            PathEntry::Merged(_) => None,
        }
    }

    pub fn conflict_mut(&mut self) -> Option<&mut ConflictInfo> {
        match self {
            PathEntry::Conflict(ci) => Some(ci),
            PathEntry::Merged(_) => None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.merged().clean
    }
}

/// Insertion-ordered map of every path the collector visited or the rename
/// machinery synthesized. Tree emission re-sorts; nothing else may depend on
/// iteration order.
pub type PathMap = IndexMap<String, PathEntry>;

/// One unresolved path as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct UnmergedEntry {
    pub path: String,
    /// Per-stage pathname; differs from `path` under renames.
    pub stage_paths: [Option<String>; 3],
    /// Per-stage (octal mode, oid).
    pub stages: [Option<(String, String)>; 3],
}
