use std::collections::{BTreeMap, HashMap};

use crate::core::database::database::Database;
use crate::core::database::entry::DatabaseEntry;
use crate::core::database::tree_diff::TreeDiff;
use crate::core::diff::myers::{diff_lines, is_binary_content, Edit};
use crate::errors::error::Error;

/// Score space for rename similarity. A pair scoring `MAX_SCORE` has
/// identical content.
pub const MAX_SCORE: u32 = 60000;
pub const DEFAULT_RENAME_SCORE: u32 = 30000;
pub const DEFAULT_RENAME_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
}

/// One changed file between a base tree and a side tree. For renames both
/// paths are set; for adds only the new side, for deletes only the old.
#[derive(Debug, Clone)]
pub struct FilePair {
    pub status: PairStatus,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub old: Option<DatabaseEntry>,
    pub new: Option<DatabaseEntry>,
    pub score: u32,
}

#[derive(Debug, Default)]
pub struct DetectedPairs {
    pub pairs: Vec<FilePair>,
    /// When the quadratic pairing matrix would have exceeded the configured
    /// limit, the limit that would have been needed. Diagnostic only.
    pub needed_rename_limit: usize,
}

/// Diff `base` against `side` and detect renames among the unpaired adds and
/// deletes. Exact (same-oid) renames pair first; content similarity pairs
/// the rest, bounded by `rename_limit` and gated on `rename_score`. Copies
/// are never detected.
pub fn diff_and_detect(
    database: &mut Database,
    base: Option<&str>,
    side: Option<&str>,
    rename_limit: usize,
    rename_score: u32,
) -> Result<DetectedPairs, Error> {
    let mut diff = TreeDiff::new(database);
    diff.compare_oids(base, side)?;
    let changes = diff.changes;

    let mut result = DetectedPairs::default();
    let mut sources: BTreeMap<String, DatabaseEntry> = BTreeMap::new();
    let mut targets: BTreeMap<String, DatabaseEntry> = BTreeMap::new();

    for (path, (old, new)) in changes {
        match (old, new) {
            (Some(old), Some(new)) => result.pairs.push(FilePair {
                status: PairStatus::Modified,
                old_path: Some(path.clone()),
                new_path: Some(path),
                old: Some(old),
                new: Some(new),
                score: 0,
            }),
            (Some(old), None) => {
                sources.insert(path, old);
            }
            (None, Some(new)) => {
                targets.insert(path, new);
            }
            (None, None) => {}
        }
    }

    // Exact renames: group sources by oid, consume them in path order.
    let mut by_oid: HashMap<String, Vec<String>> = HashMap::new();
    for (path, entry) in &sources {
        by_oid
            .entry(entry.get_oid().to_string())
            .or_default()
            .push(path.clone());
    }

    let mut paired_sources: Vec<String> = Vec::new();
    let mut paired_targets: Vec<String> = Vec::new();
    for (path, entry) in &targets {
        if let Some(candidates) = by_oid.get_mut(entry.get_oid()) {
            let matching = candidates.iter().position(|src| {
                sources[src].get_file_mode().object_type() == entry.get_file_mode().object_type()
            });
            if let Some(idx) = matching {
                let src = candidates.remove(idx);
                result.pairs.push(FilePair {
                    status: PairStatus::Renamed,
                    old_path: Some(src.clone()),
                    new_path: Some(path.clone()),
                    old: Some(sources[&src].clone()),
                    new: Some(entry.clone()),
                    score: MAX_SCORE,
                });
                paired_sources.push(src);
                paired_targets.push(path.clone());
            }
        }
    }
    for src in paired_sources {
        sources.remove(&src);
    }
    for tgt in paired_targets {
        targets.remove(&tgt);
    }

    // Inexact renames, capped: a pairing matrix larger than limit^2 is
    // skipped and only reported.
    let over_limit = rename_limit > 0 && sources.len() * targets.len() > rename_limit * rename_limit;
    if over_limit {
        result.needed_rename_limit = sources.len().max(targets.len());
    } else if !sources.is_empty() && !targets.is_empty() {
        let mut scored: Vec<(u32, String, String)> = Vec::new();
        for (src_path, src_entry) in &sources {
            if !scoreable(src_entry) {
                continue;
            }
            let src_bytes = database.read_blob_bytes(src_entry.get_oid())?;
            for (tgt_path, tgt_entry) in &targets {
                if !scoreable(tgt_entry)
                    || src_entry.get_file_mode().object_type()
                        != tgt_entry.get_file_mode().object_type()
                {
                    continue;
                }
                let tgt_bytes = database.read_blob_bytes(tgt_entry.get_oid())?;
                let score = similarity_score(&src_bytes, &tgt_bytes);
                if score >= rename_score {
                    scored.push((score, src_path.clone(), tgt_path.clone()));
                }
            }
        }

        // Best score wins; path order breaks ties deterministically.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        for (score, src, tgt) in scored {
            if !sources.contains_key(&src) || !targets.contains_key(&tgt) {
                continue;
            }
            let old = sources.remove(&src).unwrap();
            let new = targets.remove(&tgt).unwrap();
            result.pairs.push(FilePair {
                status: PairStatus::Renamed,
                old_path: Some(src),
                new_path: Some(tgt),
                old: Some(old),
                new: Some(new),
                score,
            });
        }
    }

    for (path, entry) in sources {
        result.pairs.push(FilePair {
            status: PairStatus::Deleted,
            old_path: Some(path),
            new_path: None,
            old: Some(entry),
            new: None,
            score: 0,
        });
    }
    for (path, entry) in targets {
        result.pairs.push(FilePair {
            status: PairStatus::Added,
            old_path: None,
            new_path: Some(path),
            old: None,
            new: Some(entry),
            score: 0,
        });
    }

    Ok(result)
}

fn scoreable(entry: &DatabaseEntry) -> bool {
    let mode = entry.get_file_mode();
    mode.is_regular() || mode.is_symlink()
}

/// Content similarity in [0, MAX_SCORE]: bytes of lines common to both
/// sides, relative to the larger side. Binary content never matches
/// inexactly.
pub fn similarity_score(a: &[u8], b: &[u8]) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if is_binary_content(a) || is_binary_content(b) {
        return 0;
    }

    let a_text = String::from_utf8_lossy(a);
    let b_text = String::from_utf8_lossy(b);
    let a_lines: Vec<String> = a_text.lines().map(|l| l.to_string()).collect();
    let b_lines: Vec<String> = b_text.lines().map(|l| l.to_string()).collect();

    let common_bytes: usize = diff_lines(&a_lines, &b_lines)
        .iter()
        .filter_map(|edit| match edit {
            Edit::Equal(i, _) => Some(a_lines[*i].len() + 1),
            _ => None,
        })
        .sum();

    let larger = a.len().max(b.len());
    ((common_bytes.min(larger) as u64 * MAX_SCORE as u64) / larger as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_scores_max() {
        let text = b"line one\nline two\nline three\n";
        assert_eq!(similarity_score(text, text), MAX_SCORE);
    }

    #[test]
    fn disjoint_content_scores_zero() {
        assert_eq!(similarity_score(b"aaa\nbbb\n", b"xxx\nyyy\n"), 0);
    }

    #[test]
    fn small_edit_scores_high() {
        let a = b"one\ntwo\nthree\nfour\nfive\n";
        let b = b"one\ntwo\nTHREE\nfour\nfive\n";
        let score = similarity_score(a, b);
        assert!(score > MAX_SCORE / 2, "score {} too low", score);
        assert!(score < MAX_SCORE);
    }

    #[test]
    fn binary_content_never_scores() {
        assert_eq!(similarity_score(b"a\0b", b"a\0b"), 0);
    }
}
