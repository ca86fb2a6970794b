use crate::core::database::entry::DatabaseEntry;
use crate::core::database::tree_walk::walk_level;
use crate::core::merge::path_info::{ConflictInfo, MergedInfo, PathEntry, VersionInfo};
use crate::core::merge::recursive::Merge;
use crate::errors::error::Error;

fn entries_equal(x: &Option<DatabaseEntry>, y: &Option<DatabaseEntry>) -> bool {
    match (x, y) {
        (None, None) => true,
        (Some(a), Some(b)) => a.get_oid() == b.get_oid() && a.get_file_mode() == b.get_file_mode(),
        _ => false,
    }
}

impl<'a> Merge<'a> {
    /// Walk the three trees in lock step and classify every path: resolve
    /// the trivial cases immediately, record everything else as a
    /// provisional conflict, and note which directories could have been
    /// renamed.
    pub(crate) fn collect_merge_info(
        &mut self,
        base_tree: &str,
        side1_tree: &str,
        side2_tree: &str,
    ) -> Result<(), Error> {
        self.current_dir_name = self.interner.intern("");
        self.inside_possibly_renamed_dir = false;
        self.collect_level(
            "",
            [
                Some(base_tree.to_string()),
                Some(side1_tree.to_string()),
                Some(side2_tree.to_string()),
            ],
        )
    }

    fn collect_level(&mut self, prefix: &str, oids: [Option<String>; 3]) -> Result<(), Error> {
        let level = walk_level(
            self.database,
            [oids[0].as_deref(), oids[1].as_deref(), oids[2].as_deref()],
        )?;

        for (name, walked) in level {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            let basename_offset = path.len() - name.len();

            let mut filemask = walked.mask & !walked.dirmask;
            let mut dirmask = walked.dirmask;
            let names = walked.names;

            let side1_matches_mbase = entries_equal(&names[0], &names[1]);
            let side2_matches_mbase = entries_equal(&names[0], &names[2]);
            let sides_match = entries_equal(&names[1], &names[2]);
            let side1_is_tree = dirmask & 0b010 != 0;
            let side2_is_tree = dirmask & 0b100 != 0;

            // All three match: nothing can need merging here or below.
            if side1_matches_mbase && side2_matches_mbase {
                self.insert_resolved(&path, basename_offset, names[0].clone());
                continue;
            }

            // Three files with both sides identical: take either side.
            if filemask == 0b111 && sides_match {
                self.insert_resolved(&path, basename_offset, names[1].clone());
                continue;
            }

            // One side left the path untouched: the other side's version
            // wins outright, unless renames could still involve it or a
            // file/directory mismatch needs conflict handling.
            if !self.inside_possibly_renamed_dir {
                if names[1].is_some() && side1_matches_mbase {
                    if names[2].is_none() {
                        self.insert_resolved(&path, basename_offset, None);
                        continue;
                    }
                    if side1_is_tree == side2_is_tree {
                        self.insert_resolved(&path, basename_offset, names[2].clone());
                        continue;
                    }
                    // The untouched side gives way to the other side's
                    // directory (or file); drop it from the masks and record
                    // what remains as a conflict.
                    filemask &= 0b100;
                    dirmask &= 0b100;
                } else if names[2].is_some() && side2_matches_mbase {
                    if names[1].is_none() {
                        self.insert_resolved(&path, basename_offset, None);
                        continue;
                    }
                    if side1_is_tree == side2_is_tree {
                        self.insert_resolved(&path, basename_offset, names[1].clone());
                        continue;
                    }
                    filemask &= 0b010;
                    dirmask &= 0b010;
                }
            }

            let present = filemask | dirmask;
            let df_conflict = filemask != 0 && dirmask != 0;

            let interned_path = self.interner.intern(&path);
            let mut ci = ConflictInfo::new(
                self.current_dir_name.clone(),
                basename_offset,
                interned_path,
            );
            for i in 0..3 {
                if filemask & (1 << i) != 0 {
                    ci.stages[i] = names[i].as_ref().map(VersionInfo::from_entry);
                }
            }
            ci.filemask = filemask;
            ci.dirmask = dirmask;
            ci.df_conflict = df_conflict;

            let mut match_mask = 0u8;
            if side1_matches_mbase && present & 0b011 == 0b011 {
                match_mask |= 0b011;
            }
            if side2_matches_mbase && present & 0b101 == 0b101 {
                match_mask |= 0b101;
            }
            if sides_match && present & 0b110 == 0b110 {
                match_mask |= 0b110;
            }
            ci.match_mask = match_mask;

            self.paths.insert(path.clone(), PathEntry::Conflict(ci));

            // A directory present in the base that at least one side still
            // has, but that the sides disagree about, may have been renamed;
            // renames out of it feed directory-rename inference.
            let prev_iprd = self.inside_possibly_renamed_dir;
            if dirmask & 0b001 != 0 && dirmask != 0b001 {
                self.possible_dir_rename_bases.insert(path.clone());
                self.inside_possibly_renamed_dir = true;
            }

            if dirmask != 0 {
                let mut sub: [Option<String>; 3] = [None, None, None];
                for i in 0..3 {
                    if dirmask & (1 << i) != 0 {
                        sub[i] = names[i].as_ref().map(|e| e.get_oid().to_string());
                    }
                }
                let prev_dir = std::mem::replace(
                    &mut self.current_dir_name,
                    self.interner.intern(&path),
                );
                self.collect_level(&path, sub)?;
                self.current_dir_name = prev_dir;
            }
            self.inside_possibly_renamed_dir = prev_iprd;
        }

        Ok(())
    }

    fn insert_resolved(
        &mut self,
        path: &str,
        basename_offset: usize,
        entry: Option<DatabaseEntry>,
    ) {
        let mut mi = MergedInfo::new(self.current_dir_name.clone(), basename_offset);
        mi.is_null = entry.is_none();
        mi.result = entry.as_ref().map(VersionInfo::from_entry);
        mi.clean = true;
        self.paths.insert(path.to_string(), PathEntry::Merged(mi));
    }
}
