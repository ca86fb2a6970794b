use crate::core::merge::path_info::{MergedInfo, PathEntry};
use crate::core::merge::recursive::Merge;
use crate::core::merge::tree_writer::DirectoryVersions;
use crate::errors::error::Error;

impl<'a> Merge<'a> {
    /// Resolve every collected entry and build the result tree in one pass:
    /// iterate the paths in reverse sorted order so directory contents are
    /// finished before the directory itself, resolving each entry just
    /// before it is recorded in its parent tree.
    pub(crate) fn process_entries(&mut self) -> Result<String, Error> {
        let mut plist: Vec<String> = self.paths.keys().cloned().collect();
        plist.sort();

        let root = self.interner.intern("");
        let mut dir_versions = DirectoryVersions::new(root);

        for path in plist.iter().rev() {
            let dir_name = match self.paths.get(path) {
                Some(entry) => entry.merged().directory_name.clone(),
                None => continue,
            };
            dir_versions.change_directory(self.database, &mut self.paths, dir_name)?;

            let recorded = self.process_entry(path)?;
            for key in recorded {
                if let Some(entry) = self.paths.get(&key) {
                    let mi = entry.merged();
                    let basename = key[mi.basename_offset..].to_string();
                    let info = if mi.is_null { None } else { mi.result.clone() };
                    dir_versions.record(&basename, info);
                }
            }
        }

        dir_versions.finish(self.database, &mut self.paths)
    }

    /// Resolve one entry in place. Returns the paths to record in the tree
    /// being built: normally just the entry itself, plus the relocated file
    /// when a file/directory conflict forces a rename.
    fn process_entry(&mut self, path: &str) -> Result<Vec<String>, Error> {
        let mut ci = match self.paths.get(path) {
            Some(PathEntry::Conflict(ci)) => ci.clone(),
            Some(PathEntry::Merged(_)) => return Ok(vec![path.to_string()]),
            None => return Ok(Vec::new()),
        };
        if ci.processed {
            return Ok(vec![path.to_string()]);
        }
        ci.processed = true;

        let mut out = vec![path.to_string()];
        let mut work_path = path.to_string();

        if ci.df_conflict {
            let dir_survived = ci
                .merged
                .result
                .as_ref()
                .map_or(false, |vi| vi.mode.is_directory());
            if !dir_survived {
                // The competing directory came up empty after the merge, so
                // there is no conflict left to fight about.
                ci.df_conflict = false;
            } else if ci.filemask != 0 {
                // A directory occupies this name in the finished tree.
                let side2_gives_way =
                    ci.match_mask == 0b101 && ci.filemask & 0b010 == 0;
                let side1_gives_way =
                    ci.match_mask == 0b011 && ci.filemask & 0b100 == 0;
                if ci.filemask == 0b001 || side1_gives_way || side2_gives_way {
                    // The file only existed where nothing changed it (or it
                    // was deleted everywhere); the directory keeps the name.
                    ci.stages = [None, None, None];
                    ci.filemask = 0;
                    ci.match_mask = 0;
                    ci.merged.clean = true;
                    self.paths.insert(work_path, PathEntry::Conflict(ci));
                    return Ok(out);
                }

                let file_side = if ci.filemask & 0b010 != 0 { 1 } else { 2 };
                let branch = self.branch_label(file_side);
                let new_path = self.unique_path(&work_path, &branch);
                let msg = format!(
                    "CONFLICT (file/directory): There is a directory with name {} in {}. \
                     Adding {} as {}",
                    work_path,
                    self.branch_label(3 - file_side),
                    work_path,
                    new_path
                );
                self.output(1, msg);

                let mut new_ci = ci.clone();
                new_ci.merged = MergedInfo::new(
                    ci.merged.directory_name.clone(),
                    ci.merged.basename_offset,
                );
                new_ci.dirmask = 0;

                // The old entry keeps the directory and stays visible as a
                // conflict; the file continues under its new name.
                ci.filemask = 0;
                ci.match_mask = 0;
                ci.stages = [None, None, None];
                ci.merged.clean = false;
                self.paths
                    .insert(work_path.clone(), PathEntry::Conflict(ci));
                self.unmerged.push(work_path.clone());

                self.paths
                    .insert(new_path.clone(), PathEntry::Conflict(new_ci.clone()));
                out.push(new_path.clone());
                ci = new_ci;
                work_path = new_path;
            }
        }

        let clean;
        if ci.filemask == 0 {
            // Directory placeholder: the tree writer fills in the result.
            clean = true;
        } else if ci.match_mask != 0 {
            // Two versions agree; the odd one out wins.
            let result = match ci.match_mask {
                0b011 => ci.stages[2].clone(),
                0b101 | 0b110 | 0b111 => ci.stages[1].clone(),
                _ => None,
            };
            ci.merged.is_null = result.is_none();
            ci.merged.result = result;
            clean = true;
        } else if ci.filemask == 0b110 || ci.filemask == 0b111 {
            let marker_size = self.marker_size(ci.nested_content_merge);
            let o = ci.stages[0].clone();
            let a = ci.stages[1].clone();
            let b = ci.stages[2].clone();
            let pathnames = ci.pathnames.clone();
            match self.handle_content_merge(
                &work_path,
                o.as_ref(),
                a.as_ref(),
                b.as_ref(),
                &pathnames,
                marker_size,
            ) {
                Ok((content_clean, result)) => {
                    ci.merged.result = result;
                    ci.merged.is_null = false;
                    clean = content_clean && !ci.path_conflict;
                }
                Err(err) => {
                    let msg = format!("error: failed to merge {}: {}", work_path, err);
                    self.output(0, msg);
                    ci.merged.result = ci.stages[1].clone().or_else(|| ci.stages[2].clone());
                    ci.merged.is_null = ci.merged.result.is_none();
                    clean = false;
                }
            }
            if !clean {
                let reason = if ci.stages[0].is_none() {
                    "add/add"
                } else if ci.stages[1].as_ref().map_or(false, |v| v.mode.is_gitlink()) {
                    "submodule"
                } else {
                    "content"
                };
                let msg = format!("CONFLICT ({}): Merge conflict in {}", reason, work_path);
                self.output(1, msg);
            }
        } else if ci.filemask == 0b011 || ci.filemask == 0b101 {
            // Modify/delete. In nested merges keep the base version so the
            // outer merge still sees both sides' starting point.
            let side = if ci.filemask == 0b011 { 1 } else { 2 };
            let result = if self.call_depth > 0 {
                ci.stages[0].clone()
            } else {
                ci.stages[side].clone()
            };
            ci.merged.is_null = result.is_none();
            ci.merged.result = result;
            clean = false;
            if !ci.path_conflict {
                let modified = self.branch_label(side);
                let deleted = self.branch_label(3 - side);
                let msg = format!(
                    "CONFLICT (modify/delete): {} deleted in {} and modified in {}. \
                     Version {} of {} left in tree.",
                    work_path, deleted, modified, modified, work_path
                );
                self.output(1, msg);
            }
        } else if ci.filemask == 0b010 || ci.filemask == 0b100 {
            // Added on one side.
            let side = if ci.filemask == 0b010 { 1 } else { 2 };
            ci.merged.result = ci.stages[side].clone();
            ci.merged.is_null = false;
            clean = !ci.df_conflict && !ci.path_conflict;
        } else if ci.filemask == 0b001 {
            // Deleted on both sides.
            ci.merged.result = None;
            ci.merged.is_null = true;
            clean = !ci.path_conflict;
        } else {
            clean = false;
        }

        ci.merged.clean = clean;
        if !clean {
            self.unmerged.push(work_path.clone());
        }
        self.paths.insert(work_path, PathEntry::Conflict(ci));
        Ok(out)
    }

    /// Derive a fresh path for content displaced by a directory: append the
    /// branch label (path separators flattened to underscores) and a
    /// numeric suffix until the name is unused.
    pub(crate) fn unique_path(&self, path: &str, branch: &str) -> String {
        let flat: String = branch
            .chars()
            .map(|c| if c == '/' { '_' } else { c })
            .collect();
        let base = format!("{}~{}", path, flat);
        let mut candidate = base.clone();
        let mut suffix = 0;
        while self.paths.contains_key(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }
}
