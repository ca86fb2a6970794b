use std::rc::Rc;

use crate::core::database::blob::Blob;
use crate::core::merge::common_ancestors::{find_merges_containing, is_ancestor};
use crate::core::merge::diff3::{self, MergeFavor, DEFAULT_MARKER_SIZE};
use crate::core::merge::options::RecursiveVariant;
use crate::core::merge::path_info::VersionInfo;
use crate::core::merge::recursive::Merge;
use crate::errors::error::Error;

impl<'a> Merge<'a> {
    /// Conflict marker width for a content merge at the current recursion
    /// depth; each nesting level (virtual-base merges, merges of merge
    /// results) doubles it so the markers stay distinguishable.
    pub(crate) fn marker_size(&self, nested: bool) -> usize {
        DEFAULT_MARKER_SIZE << (self.call_depth + nested as usize)
    }

    /// Merge one path's three versions into a single (mode, oid). `path` is
    /// where the result will live; `pathnames` are where the stages came
    /// from, which differ under renames and show up in the marker labels.
    /// Returns the cleanliness verdict along with the result.
    pub(crate) fn handle_content_merge(
        &mut self,
        path: &str,
        o: Option<&VersionInfo>,
        a: Option<&VersionInfo>,
        b: Option<&VersionInfo>,
        pathnames: &[Rc<str>; 3],
        marker_size: usize,
    ) -> Result<(bool, Option<VersionInfo>), Error> {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(Error::Generic(format!(
                    "content merge of {} requires both sides",
                    path
                )))
            }
        };

        let mut clean = true;

        if a.mode.object_type() != b.mode.object_type() {
            // Not both files, not both submodules, not both symlinks. Keep
            // the side with the "stronger" type and let the other vanish
            // into a conflict; relocating the loser would be nicer.
            clean = false;
            let keep = if a.mode.is_regular() {
                a
            } else if b.mode.is_regular() {
                b
            } else if a.mode.is_gitlink() {
                a
            } else if b.mode.is_gitlink() {
                b
            } else {
                a
            };
            return Ok((clean, Some(keep.clone())));
        }

        // Merge modes: the side that differs from the base wins; two fresh
        // modes keep side1's and are flagged.
        let o_mode = o.map(|v| v.mode);
        let mode = if a.mode == b.mode || Some(a.mode) == o_mode {
            b.mode
        } else if Some(b.mode) == o_mode {
            a.mode
        } else {
            clean = false;
            a.mode
        };

        let o_oid = o.map(|v| v.oid.as_str());

        // Trivial oid resolution, as for any three-way value merge.
        let oid = if a.oid == b.oid {
            a.oid.clone()
        } else if Some(a.oid.as_str()) == o_oid {
            b.oid.clone()
        } else if Some(b.oid.as_str()) == o_oid {
            a.oid.clone()
        } else if a.mode.is_regular() {
            let (content_clean, oid) = self.merge_blob_content(path, o, a, b, pathnames, marker_size)?;
            clean = clean && content_clean;
            oid
        } else if a.mode.is_gitlink() {
            let (sub_clean, oid) = self.merge_submodule(path, o_oid, &a.oid, &b.oid)?;
            clean = clean && sub_clean;
            oid
        } else {
            // Symlinks: nothing sensible to merge textually.
            match self.opt.recursive_variant {
                RecursiveVariant::FavorOurs => a.oid.clone(),
                RecursiveVariant::FavorTheirs => b.oid.clone(),
                RecursiveVariant::Normal => {
                    clean = false;
                    a.oid.clone()
                }
            }
        };

        Ok((clean, Some(VersionInfo { mode, oid })))
    }

    fn merge_blob_content(
        &mut self,
        path: &str,
        o: Option<&VersionInfo>,
        a: &VersionInfo,
        b: &VersionInfo,
        pathnames: &[Rc<str>; 3],
        marker_size: usize,
    ) -> Result<(bool, String), Error> {
        self.output(2, format!("Auto-merging {}", path));

        let o_bytes = match o {
            Some(o) => self.database.read_blob_bytes(&o.oid)?,
            None => Vec::new(),
        };
        let a_bytes = self.database.read_blob_bytes(&a.oid)?;
        let b_bytes = self.database.read_blob_bytes(&b.oid)?;

        let o_text = String::from_utf8_lossy(&o_bytes).to_string();
        let a_text = String::from_utf8_lossy(&a_bytes).to_string();
        let b_text = String::from_utf8_lossy(&b_bytes).to_string();

        let favor = match self.opt.recursive_variant {
            RecursiveVariant::Normal => None,
            RecursiveVariant::FavorOurs => Some(MergeFavor::Ours),
            RecursiveVariant::FavorTheirs => Some(MergeFavor::Theirs),
        };

        let result = diff3::merge(&o_text, &a_text, &b_text, favor)?;

        let same_paths =
            pathnames[0] == pathnames[1] && pathnames[1] == pathnames[2];
        let (label_a, label_b) = if same_paths {
            (self.opt.branch1.clone(), self.opt.branch2.clone())
        } else {
            (
                format!("{}:{}", self.opt.branch1, pathnames[1]),
                format!("{}:{}", self.opt.branch2, pathnames[2]),
            )
        };

        let merged_text = result.to_string(Some(&label_a), Some(&label_b), marker_size);
        let mut blob = Blob::new(merged_text.into_bytes());
        let oid = self.database.store(&mut blob)?;

        Ok((result.is_clean(), oid))
    }

    /// Submodules are opaque commit pointers: fast-forward when one side
    /// contains the other, otherwise report any existing merges of the two
    /// and leave the conflict. During recursion the search is skipped and
    /// side1 is kept, which loses base information in nested merges.
    fn merge_submodule(
        &mut self,
        path: &str,
        _o_oid: Option<&str>,
        a_oid: &str,
        b_oid: &str,
    ) -> Result<(bool, String), Error> {
        if self.call_depth > 0 {
            return Ok((false, a_oid.to_string()));
        }

        if !self.database.exists(a_oid) || !self.database.exists(b_oid) {
            self.output(
                1,
                format!(
                    "Failed to merge submodule {} (commits not present)",
                    path
                ),
            );
            return Ok((false, a_oid.to_string()));
        }

        if is_ancestor(self.database, a_oid, b_oid)? {
            self.output(
                2,
                format!("Fast-forwarding submodule {} to {}", path, b_oid),
            );
            return Ok((true, b_oid.to_string()));
        }
        if is_ancestor(self.database, b_oid, a_oid)? {
            self.output(
                2,
                format!("Fast-forwarding submodule {} to {}", path, a_oid),
            );
            return Ok((true, a_oid.to_string()));
        }

        let candidates = find_merges_containing(self.database, a_oid, b_oid)?;
        if candidates.is_empty() {
            self.output(
                1,
                format!("Failed to merge submodule {} (merge following commits not found)", path),
            );
        } else {
            self.output(
                1,
                format!("Found a possible merge resolution for submodule {}:", path),
            );
            for candidate in &candidates {
                let short = self.database.short_oid(candidate);
                self.output(1, format!("  {}", short));
            }
        }

        Ok((false, a_oid.to_string()))
    }
}
