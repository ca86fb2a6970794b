use std::collections::HashMap;

use crate::core::merge::dir_rename::{dir_rename_target, infer_directory_renames, DirRenameInfo};
use crate::core::merge::options::DirRenameDetection;
use crate::core::merge::path_info::{ConflictInfo, MergedInfo, PathEntry, VersionInfo};
use crate::core::merge::recursive::Merge;
use crate::core::merge::renames::RenamePair;
use crate::errors::error::Error;
use std::collections::BTreeMap;

fn version_equal(a: &Option<VersionInfo>, b: &Option<VersionInfo>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.mode == y.mode && x.oid == y.oid,
        _ => false,
    }
}

impl<'a> Merge<'a> {
    /// Infer per-side directory renames, reconcile them across sides, and
    /// move the other side's new files into the renamed locations. Returns
    /// the performed moves so explicit pair processing can chase redirected
    /// destinations.
    pub(crate) fn apply_directory_renames(
        &mut self,
        side1_pairs: &[RenamePair],
        side2_pairs: &[RenamePair],
    ) -> Result<HashMap<String, String>, Error> {
        let mut redirects = HashMap::new();
        if self.opt.detect_directory_renames == DirRenameDetection::None {
            return Ok(redirects);
        }

        let mut dir_renames = [
            infer_directory_renames(side1_pairs, &self.possible_dir_rename_bases),
            infer_directory_renames(side2_pairs, &self.possible_dir_rename_bases),
        ];

        for renames in &dir_renames {
            for (old_dir, info) in renames.iter() {
                if info.non_unique_new_dir {
                    let msg = format!(
                        "CONFLICT (directory rename split): Unclear where to rename {} to; \
                         it was renamed to multiple other directories, with no destination \
                         getting a majority of the files.",
                        old_dir
                    );
                    self.output(1, msg);
                }
            }
        }

        self.reconcile_dir_renames(&mut dir_renames);

        for side in 0..2 {
            let renaming_side = side + 1;
            let other_side = 2 - side;
            let moves: Vec<(String, String)> = dir_renames[side]
                .iter()
                .filter_map(|(old_dir, info)| {
                    info.new_dir
                        .as_ref()
                        .map(|new_dir| (old_dir.clone(), new_dir.clone()))
                })
                .collect();

            for (old_dir, new_dir) in moves {
                self.move_new_files(
                    &old_dir,
                    &new_dir,
                    renaming_side,
                    other_side,
                    &mut redirects,
                )?;
            }
        }

        Ok(redirects)
    }

    /// Cross-side fixups: a source directory renamed to different places on
    /// the two sides gets no winner at all, and a winner whose destination
    /// directory was itself renamed away by the other side is suppressed.
    fn reconcile_dir_renames(&mut self, dir_renames: &mut [BTreeMap<String, DirRenameInfo>; 2]) {
        let shared: Vec<String> = dir_renames[0]
            .keys()
            .filter(|dir| dir_renames[1].contains_key(*dir))
            .cloned()
            .collect();
        for old_dir in shared {
            let w1 = dir_renames[0][&old_dir].new_dir.clone();
            let w2 = dir_renames[1][&old_dir].new_dir.clone();
            if let (Some(w1), Some(w2)) = (w1, w2) {
                if w1 != w2 {
                    let msg = format!(
                        "CONFLICT (rename/rename): Directory {} renamed to {} in {} and to {} in {}",
                        old_dir,
                        w1,
                        self.branch_label(1),
                        w2,
                        self.branch_label(2)
                    );
                    self.output(1, msg);
                    dir_renames[0].get_mut(&old_dir).unwrap().new_dir = None;
                    dir_renames[1].get_mut(&old_dir).unwrap().new_dir = None;
                }
            }
        }

        for side in 0..2 {
            let other = 1 - side;
            let suppressed: Vec<String> = dir_renames[side]
                .iter()
                .filter_map(|(old_dir, info)| {
                    let winner = info.new_dir.as_ref()?;
                    let other_renamed_winner = dir_renames[other]
                        .get(winner)
                        .map_or(false, |other_info| other_info.new_dir.is_some());
                    if other_renamed_winner {
                        Some(old_dir.clone())
                    } else {
                        None
                    }
                })
                .collect();
            for old_dir in suppressed {
                let winner = dir_renames[side][&old_dir].new_dir.clone().unwrap();
                let msg = format!(
                    "Note: not moving new files into {} because {} renamed that directory away",
                    winner,
                    self.branch_label(2 - side)
                );
                self.output(2, msg);
                dir_renames[side].get_mut(&old_dir).unwrap().new_dir = None;
            }
        }
    }

    /// Move paths that only the non-renaming side created under `old_dir`
    /// into `new_dir`. Collisions are reported and left in place.
    fn move_new_files(
        &mut self,
        old_dir: &str,
        new_dir: &str,
        renaming_side: usize,
        other_side: usize,
        redirects: &mut HashMap<String, String>,
    ) -> Result<(), Error> {
        let other_bit = 1u8 << other_side;
        let prefix = format!("{}/", old_dir);

        let mut candidates: Vec<String> = self
            .paths
            .iter()
            .filter_map(|(path, entry)| {
                if !path.starts_with(&prefix) {
                    return None;
                }
                let ci = entry.conflict()?;
                if ci.filemask == other_bit && ci.dirmask == 0 && !ci.merged.clean {
                    Some(path.clone())
                } else {
                    None
                }
            })
            .collect();
        candidates.sort();

        for path in candidates {
            let target = match dir_rename_target(&path, old_dir, new_dir) {
                Some(target) => target,
                None => continue,
            };

            let occupied = match self.paths.get(&target) {
                None => false,
                Some(PathEntry::Merged(mi)) => !mi.is_null,
                Some(PathEntry::Conflict(ci)) => ci.filemask != 0 || ci.dirmask != 0,
            } || redirects.values().any(|claimed| claimed == &target);

            if occupied {
                let msg = format!(
                    "CONFLICT (implicit dir rename): Existing file/dir at {} in the way of \
                     implicit directory rename(s) putting {} there",
                    target, path
                );
                self.output(1, msg);
                if let Some(ci) = self.paths.get_mut(&path).and_then(PathEntry::conflict_mut) {
                    ci.path_conflict = true;
                }
                continue;
            }

            let mut entry = self.paths.shift_remove(&path).unwrap();
            if let PathEntry::Conflict(ci) = &mut entry {
                let (dirname, offset) = match target.rfind('/') {
                    Some(pos) => (&target[..pos], pos + 1),
                    None => ("", 0),
                };
                ci.merged.directory_name = self.interner.intern(dirname);
                ci.merged.basename_offset = offset;
            }
            self.paths.insert(target.clone(), entry);
            self.ensure_ancestor_entries(&target);

            if self.opt.detect_directory_renames == DirRenameDetection::Conflict {
                let msg = format!(
                    "Path updated: {} added in {} inside a directory that was renamed in {}; \
                     moving it to {}.",
                    path,
                    self.branch_label(other_side),
                    self.branch_label(renaming_side),
                    target
                );
                self.output(1, msg);
            }
            redirects.insert(path, target);
        }

        Ok(())
    }

    /// Make sure every ancestor directory of `target` has a path-map entry,
    /// so the tree writer has somewhere to put the emitted tree ids.
    fn ensure_ancestor_entries(&mut self, target: &str) {
        let mut pos = 0;
        while let Some(sep) = target[pos..].find('/') {
            let dir_end = pos + sep;
            let dir = &target[..dir_end];
            if !self.paths.contains_key(dir) {
                let (parent, offset) = match dir.rfind('/') {
                    Some(p) => (&dir[..p], p + 1),
                    None => ("", 0),
                };
                let parent = self.interner.intern(parent);
                let interned = self.interner.intern(dir);
                let ci = ConflictInfo::new(parent, offset, interned);
                self.paths.insert(dir.to_string(), PathEntry::Conflict(ci));
            }
            pos = dir_end + 1;
        }
    }

    /// Apply the explicit rename pairs of both sides to the path map. Pairs
    /// are sorted by source so the two sides' renames of one path are
    /// adjacent.
    pub(crate) fn process_rename_pairs(
        &mut self,
        mut pairs: Vec<RenamePair>,
        redirects: &HashMap<String, String>,
    ) -> Result<(), Error> {
        pairs.sort_by(|a, b| {
            a.old_path
                .cmp(&b.old_path)
                .then(b.score.cmp(&a.score))
                .then(a.side.cmp(&b.side))
        });

        // rename/rename(2to1) groups are keyed by destination, not source:
        // the two sources are distinct paths, and the side that kept each
        // source untouched lets the collector resolve it as a trivial
        // deletion, so a source-keyed walk would never see the collision.
        let mut consumed = vec![false; pairs.len()];
        for i in 0..pairs.len() {
            if consumed[i] {
                continue;
            }
            let source_is_shared = pairs
                .iter()
                .enumerate()
                .any(|(j, p)| j != i && p.old_path == pairs[i].old_path);
            if source_is_shared {
                continue;
            }
            let dest_i = redirected(redirects, &pairs[i].new_path);
            for j in i + 1..pairs.len() {
                if consumed[j]
                    || pairs[j].side == pairs[i].side
                    || pairs[j].old_path == pairs[i].old_path
                {
                    continue;
                }
                if redirected(redirects, &pairs[j].new_path) != dest_i {
                    continue;
                }
                let (p1, p2) = if pairs[i].side == 1 {
                    (pairs[i].clone(), pairs[j].clone())
                } else {
                    (pairs[j].clone(), pairs[i].clone())
                };
                self.rename_shared_destination(&p1, &p2, &dest_i)?;
                consumed[i] = true;
                consumed[j] = true;
                break;
            }
        }

        let mut i = 0;
        while i < pairs.len() {
            if consumed[i] {
                i += 1;
                continue;
            }
            if i + 1 < pairs.len() && pairs[i + 1].old_path == pairs[i].old_path {
                let (first, second) = (pairs[i].clone(), pairs[i + 1].clone());
                i += 2;
                let (p1, p2) = if first.side == 1 {
                    (first, second)
                } else {
                    (second, first)
                };
                let dest1 = redirected(redirects, &p1.new_path);
                let dest2 = redirected(redirects, &p2.new_path);
                if dest1 == dest2 {
                    self.rename_same_destination(&p1, &dest1)?;
                } else {
                    self.rename_split_destinations(&p1, &p2, &dest1, &dest2)?;
                }
                continue;
            }

            let pair = pairs[i].clone();
            i += 1;
            let dest_key = redirected(redirects, &pair.new_path);
            self.apply_single_rename(&pair, &dest_key)?;
        }

        Ok(())
    }

    /// rename/rename(1to1): both sides renamed the source to the same
    /// destination; carry the base stage over and retire the source.
    fn rename_same_destination(&mut self, pair: &RenamePair, dest_key: &str) -> Result<(), Error> {
        let src = match self.take_live_source(&pair.old_path) {
            Some(src) => src,
            None => return Ok(()),
        };

        if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut) {
            dest.stages[0] = src.stages[0].clone();
            dest.pathnames[0] = src.pathnames[0].clone();
            dest.filemask |= src.filemask & 0b001;
            recompute_match_mask(dest);
        }
        self.retire_source(&pair.old_path, &src);
        Ok(())
    }

    /// rename/rename(1to2): the sides renamed one source to two different
    /// destinations. Content-merge the three versions once and stage the
    /// result at both destinations; all three paths become path conflicts.
    fn rename_split_destinations(
        &mut self,
        p1: &RenamePair,
        p2: &RenamePair,
        dest1: &str,
        dest2: &str,
    ) -> Result<(), Error> {
        let mut src = match self.take_live_source(&p1.old_path) {
            Some(src) => src,
            None => return Ok(()),
        };

        let msg = format!(
            "CONFLICT (rename/rename): {} renamed to {} in {} and to {} in {}",
            p1.old_path,
            dest1,
            self.branch_label(1),
            dest2,
            self.branch_label(2)
        );
        self.output(1, msg);

        let pathnames = [
            self.interner.intern(&p1.old_path),
            self.interner.intern(dest1),
            self.interner.intern(dest2),
        ];
        let marker_size = self.marker_size(false);
        let base_stage = src.stages[0].clone();
        let (_, merged) = self.handle_content_merge(
            &p1.old_path,
            base_stage.as_ref(),
            Some(&p1.new),
            Some(&p2.new),
            &pathnames,
            marker_size,
        )?;

        for (dest_key, side) in [(dest1, 1usize), (dest2, 2usize)] {
            if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut) {
                dest.stages[0] = base_stage.clone();
                dest.pathnames[0] = pathnames[0].clone();
                dest.filemask |= src.filemask & 0b001;
                dest.stages[side] = merged.clone();
                dest.match_mask = 0;
                dest.path_conflict = true;
            }
        }

        src.path_conflict = true;
        self.paths
            .insert(p1.old_path.clone(), PathEntry::Conflict(src));
        Ok(())
    }

    /// rename/rename(2to1): each side renamed a different source onto the
    /// same destination. Each side's rename content is merged with the
    /// other side's version of its source and staged at the destination
    /// under the original pathname; the final add/add collision there then
    /// resolves with widened markers.
    fn rename_shared_destination(
        &mut self,
        p1: &RenamePair,
        p2: &RenamePair,
        dest_key: &str,
    ) -> Result<(), Error> {
        let msg = format!(
            "CONFLICT (rename/rename): {} renamed to {} in {} and {} renamed to {} in {}",
            p1.old_path,
            dest_key,
            self.branch_label(1),
            p2.old_path,
            dest_key,
            self.branch_label(2)
        );
        self.output(1, msg);

        let marker_size = self.marker_size(false);
        for (pair, side) in [(p1, 1usize), (p2, 2usize)] {
            let other = 3 - side;
            let src = self.take_live_source(&pair.old_path);
            // The other side's version of this source: still staged when
            // the source entry is live, otherwise it matched the base.
            let other_stage = match &src {
                Some(ci) => ci.stages[other].clone(),
                None => Some(pair.old.clone()),
            };

            let old_interned = self.interner.intern(&pair.old_path);
            let merged = match other_stage {
                Some(other_vi) => {
                    let mut pathnames = [
                        old_interned.clone(),
                        old_interned.clone(),
                        old_interned.clone(),
                    ];
                    pathnames[side] = self.interner.intern(dest_key);
                    let (a, b) = if side == 1 {
                        (Some(&pair.new), Some(&other_vi))
                    } else {
                        (Some(&other_vi), Some(&pair.new))
                    };
                    let (_, merged) = self.handle_content_merge(
                        dest_key,
                        Some(&pair.old),
                        a,
                        b,
                        &pathnames,
                        marker_size,
                    )?;
                    merged
                }
                // Deleted on the other side; the renamed content stands.
                None => Some(pair.new.clone()),
            };

            if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut) {
                dest.stages[side] = merged;
                dest.pathnames[side] = old_interned;
                dest.nested_content_merge = true;
                dest.match_mask = 0;
            }
            if let Some(src) = src {
                self.retire_source(&pair.old_path, &src);
            }
        }

        Ok(())
    }

    /// Ordinary rename, rename/delete and rename/add.
    fn apply_single_rename(&mut self, pair: &RenamePair, dest_key: &str) -> Result<(), Error> {
        let side = pair.side;
        let other = 3 - side;
        let other_bit = 1u8 << other;

        let src = match self.take_live_source(&pair.old_path) {
            Some(src) => src,
            None => return Ok(()),
        };

        let dest_filemask = match self.paths.get(dest_key).and_then(PathEntry::conflict) {
            Some(dest) if !dest.merged.clean => dest.filemask,
            _ => {
                // Destination vanished or resolved; leave the source alone.
                self.paths
                    .insert(pair.old_path.clone(), PathEntry::Conflict(src));
                return Ok(());
            }
        };

        if dest_filemask & other_bit != 0 {
            // Destination also carries the other side's version.
            if src.filemask & other_bit != 0 {
                // rename/add: fold the other side's edits of the source
                // into the renamed content, then let add/add resolution
                // fight it out at the target.
                let msg = format!(
                    "CONFLICT (rename/add): Rename {}->{} in {}. Added {} in {}",
                    pair.old_path,
                    dest_key,
                    self.branch_label(side),
                    dest_key,
                    self.branch_label(other)
                );
                self.output(1, msg);

                let old_interned = self.interner.intern(&pair.old_path);
                let mut pathnames = [
                    old_interned.clone(),
                    old_interned.clone(),
                    old_interned.clone(),
                ];
                pathnames[side] = self.interner.intern(dest_key);
                let base_stage = src.stages[0].clone();
                let other_stage = src.stages[other].clone();
                let (a, b) = if side == 1 {
                    (Some(&pair.new), other_stage.as_ref())
                } else {
                    (other_stage.as_ref(), Some(&pair.new))
                };
                let marker_size = self.marker_size(false);
                let (_, merged) = self.handle_content_merge(
                    dest_key,
                    base_stage.as_ref(),
                    a,
                    b,
                    &pathnames,
                    marker_size,
                )?;

                if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut)
                {
                    dest.stages[side] = merged;
                    dest.pathnames[side] = pathnames[side].clone();
                    dest.nested_content_merge = true;
                    dest.match_mask = 0;
                }
            } else {
                // The other side deleted the source and independently added
                // something at the destination. Degrades to an add/add-shaped
                // collision at the target.
                // TODO: report rename/add/delete as its own conflict kind.
                if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut)
                {
                    dest.path_conflict = true;
                    dest.match_mask = 0;
                }
                let msg = format!(
                    "CONFLICT (rename/delete): {} renamed to {} in {} but deleted in {}; \
                     {} also added in {}",
                    pair.old_path,
                    dest_key,
                    self.branch_label(side),
                    self.branch_label(other),
                    dest_key,
                    self.branch_label(other)
                );
                self.output(1, msg);
            }
            self.retire_source(&pair.old_path, &src);
            return Ok(());
        }

        // Plain rename: move the base and other-side stages to the new
        // location and retire the old path.
        if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut) {
            dest.stages[0] = src.stages[0].clone();
            dest.pathnames[0] = src.pathnames[0].clone();
            dest.filemask |= src.filemask & 0b001;
            if src.filemask & other_bit != 0 {
                dest.stages[other] = src.stages[other].clone();
                dest.pathnames[other] = src.pathnames[other].clone();
                dest.filemask |= other_bit;
            }
            recompute_match_mask(dest);
        }

        if src.filemask & other_bit == 0 {
            // rename/delete: the conflict will surface at the destination.
            let msg = format!(
                "CONFLICT (rename/delete): {} renamed to {} in {} but deleted in {}",
                pair.old_path,
                dest_key,
                self.branch_label(side),
                self.branch_label(other)
            );
            self.output(1, msg);
            if let Some(dest) = self.paths.get_mut(dest_key).and_then(PathEntry::conflict_mut) {
                dest.path_conflict = true;
            }
        }

        self.retire_source(&pair.old_path, &src);
        Ok(())
    }

    /// Fetch the source entry of a rename if it still needs processing.
    /// Resolved or missing sources (their parent merged cleanly, or another
    /// pair consumed them) are skipped. The entry is removed; callers either
    /// retire it or put it back.
    fn take_live_source(&mut self, old_path: &str) -> Option<ConflictInfo> {
        match self.paths.get(old_path) {
            Some(PathEntry::Conflict(ci)) if !ci.merged.clean => {}
            _ => return None,
        }
        match self.paths.shift_remove(old_path) {
            Some(PathEntry::Conflict(ci)) => Some(ci),
            _ => None,
        }
    }

    /// The rename consumed the old path: resolve it as cleanly removed.
    fn retire_source(&mut self, old_path: &str, src: &ConflictInfo) {
        let mut mi = MergedInfo::new(
            src.merged.directory_name.clone(),
            src.merged.basename_offset,
        );
        mi.is_null = true;
        mi.clean = true;
        self.paths.insert(old_path.to_string(), PathEntry::Merged(mi));
    }
}

fn redirected(redirects: &HashMap<String, String>, path: &str) -> String {
    redirects
        .get(path)
        .cloned()
        .unwrap_or_else(|| path.to_string())
}

fn recompute_match_mask(ci: &mut ConflictInfo) {
    let present = ci.filemask | ci.dirmask;
    let mut mask = 0u8;
    if present & 0b011 == 0b011 && version_equal(&ci.stages[0], &ci.stages[1]) {
        mask |= 0b011;
    }
    if present & 0b101 == 0b101 && version_equal(&ci.stages[0], &ci.stages[2]) {
        mask |= 0b101;
    }
    if present & 0b110 == 0b110 && version_equal(&ci.stages[1], &ci.stages[2]) {
        mask |= 0b110;
    }
    ci.match_mask = mask;
}
