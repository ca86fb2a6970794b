use std::collections::{BTreeMap, HashSet};

use crate::core::merge::renames::RenamePair;

/// Tally of where one source directory's files were renamed to, and the
/// majority verdict.
#[derive(Debug, Default)]
pub struct DirRenameInfo {
    pub possible_new_dirs: BTreeMap<String, usize>,
    pub new_dir: Option<String>,
    pub non_unique_new_dir: bool,
}

/// Extract the renamed directory portion of a rename: drop the basenames,
/// then the common trailing directory components; what remains on each side
/// is the old and new name of the moved directory. Returns `None` when the
/// directories agree (a plain file rename) or when the source portion would
/// be the root, which cannot itself be renamed.
pub fn renamed_dir_portion(old_path: &str, new_path: &str) -> Option<(String, String)> {
    let mut old_dirs: Vec<&str> = old_path.split('/').collect();
    let mut new_dirs: Vec<&str> = new_path.split('/').collect();
    old_dirs.pop();
    new_dirs.pop();

    while let (Some(o), Some(n)) = (old_dirs.last(), new_dirs.last()) {
        if o != n {
            break;
        }
        old_dirs.pop();
        new_dirs.pop();
    }

    if old_dirs.is_empty() {
        return None;
    }

    let old_dir = old_dirs.join("/");
    let new_dir = new_dirs.join("/");
    if old_dir == new_dir {
        return None;
    }
    Some((old_dir, new_dir))
}

/// Group one side's renames by renamed directory portion and pick a winner
/// per source directory: the destination with a strict majority of the
/// moved files. Only renames out of the candidate base directories can
/// contribute.
pub fn infer_directory_renames(
    pairs: &[RenamePair],
    bases: &HashSet<String>,
) -> BTreeMap<String, DirRenameInfo> {
    let mut renames: BTreeMap<String, DirRenameInfo> = BTreeMap::new();

    for pair in pairs {
        if !source_has_base(&pair.old_path, bases) {
            continue;
        }
        let (old_dir, new_dir) = match renamed_dir_portion(&pair.old_path, &pair.new_path) {
            Some(portion) => portion,
            None => continue,
        };
        let info = renames.entry(old_dir).or_default();
        *info.possible_new_dirs.entry(new_dir).or_insert(0) += 1;
    }

    for info in renames.values_mut() {
        let best = info.possible_new_dirs.values().max().copied().unwrap_or(0);
        let winners: Vec<&String> = info
            .possible_new_dirs
            .iter()
            .filter(|(_, count)| **count == best)
            .map(|(dir, _)| dir)
            .collect();
        if winners.len() == 1 {
            info.new_dir = Some(winners[0].clone());
        } else {
            info.non_unique_new_dir = true;
        }
    }

    renames
}

fn source_has_base(old_path: &str, bases: &HashSet<String>) -> bool {
    let mut prefix = old_path;
    while let Some(pos) = prefix.rfind('/') {
        prefix = &prefix[..pos];
        if bases.contains(prefix) {
            return true;
        }
    }
    false
}

/// New location of `path` under the `old_dir` -> `new_dir` move, if `path`
/// lives under `old_dir`.
pub fn dir_rename_target(path: &str, old_dir: &str, new_dir: &str) -> Option<String> {
    let rest = path.strip_prefix(old_dir)?.strip_prefix('/')?;
    if new_dir.is_empty() {
        Some(rest.to_string())
    } else {
        Some(format!("{}/{}", new_dir, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_mode::FileMode;
    use crate::core::merge::path_info::VersionInfo;

    fn pair(side: usize, old: &str, new: &str) -> RenamePair {
        let vi = VersionInfo {
            mode: FileMode::REGULAR,
            oid: "aa".repeat(20),
        };
        RenamePair {
            side,
            old_path: old.to_string(),
            new_path: new.to_string(),
            old: vi.clone(),
            new: vi,
            score: 60000,
        }
    }

    #[test]
    fn portion_strips_common_suffix() {
        assert_eq!(
            renamed_dir_portion("d/a", "e/a"),
            Some(("d".to_string(), "e".to_string()))
        );
        assert_eq!(
            renamed_dir_portion("x/d/sub/a", "x/e/sub/a"),
            Some(("x/d".to_string(), "x/e".to_string()))
        );
    }

    #[test]
    fn portion_ignores_basename_changes() {
        assert_eq!(
            renamed_dir_portion("d/a", "e/b"),
            Some(("d".to_string(), "e".to_string()))
        );
    }

    #[test]
    fn root_and_same_dir_are_excluded() {
        assert_eq!(renamed_dir_portion("a", "b"), None);
        assert_eq!(renamed_dir_portion("d/a", "d/b"), None);
        assert_eq!(renamed_dir_portion("a", "sub/a"), None);
    }

    #[test]
    fn majority_wins() {
        let bases: HashSet<String> = ["d".to_string()].into_iter().collect();
        let pairs = vec![
            pair(1, "d/a", "e/a"),
            pair(1, "d/b", "e/b"),
            pair(1, "d/c", "f/c"),
        ];
        let renames = infer_directory_renames(&pairs, &bases);
        assert_eq!(renames["d"].new_dir.as_deref(), Some("e"));
        assert!(!renames["d"].non_unique_new_dir);
    }

    #[test]
    fn tie_has_no_winner() {
        let bases: HashSet<String> = ["d".to_string()].into_iter().collect();
        let pairs = vec![pair(1, "d/a", "e/a"), pair(1, "d/b", "f/b")];
        let renames = infer_directory_renames(&pairs, &bases);
        assert_eq!(renames["d"].new_dir, None);
        assert!(renames["d"].non_unique_new_dir);
    }

    #[test]
    fn sources_outside_bases_do_not_count() {
        let bases: HashSet<String> = HashSet::new();
        let pairs = vec![pair(1, "d/a", "e/a")];
        let renames = infer_directory_renames(&pairs, &bases);
        assert!(renames.is_empty());
    }

    #[test]
    fn target_rebasing() {
        assert_eq!(
            dir_rename_target("d/x", "d", "e").as_deref(),
            Some("e/x")
        );
        assert_eq!(
            dir_rename_target("d/sub/x", "d", "e").as_deref(),
            Some("e/sub/x")
        );
        assert_eq!(dir_rename_target("other/x", "d", "e"), None);
    }
}
