use crate::core::diff::similarity::{diff_and_detect, PairStatus};
use crate::core::merge::path_info::VersionInfo;
use crate::core::merge::recursive::Merge;
use crate::errors::error::Error;

/// One detected rename on one side of history.
#[derive(Debug, Clone)]
pub struct RenamePair {
    /// 1 or 2: which side the rename happened on.
    pub side: usize,
    pub old_path: String,
    pub new_path: String,
    pub old: VersionInfo,
    pub new: VersionInfo,
    pub score: u32,
}

impl<'a> Merge<'a> {
    /// Rename pipeline: per-side detection, directory-rename inference with
    /// cross-side fixups, implicit moves of new files, then application of
    /// the explicit pairs to the path map.
    pub(crate) fn detect_and_process_renames(
        &mut self,
        base_tree: &str,
        side1_tree: &str,
        side2_tree: &str,
    ) -> Result<(), Error> {
        let side1_pairs = self.detect_side_renames(1, base_tree, side1_tree)?;
        let side2_pairs = self.detect_side_renames(2, base_tree, side2_tree)?;

        let redirects = self.apply_directory_renames(&side1_pairs, &side2_pairs)?;

        let mut combined: Vec<RenamePair> = Vec::new();
        combined.extend(side1_pairs);
        combined.extend(side2_pairs);
        self.process_rename_pairs(combined, &redirects)
    }

    fn detect_side_renames(
        &mut self,
        side: usize,
        base_tree: &str,
        side_tree: &str,
    ) -> Result<Vec<RenamePair>, Error> {
        let detected = diff_and_detect(
            self.database,
            Some(base_tree),
            Some(side_tree),
            self.opt.effective_rename_limit(),
            self.opt.rename_score,
        )?;

        if detected.needed_rename_limit > self.needed_rename_limit {
            self.needed_rename_limit = detected.needed_rename_limit;
        }

        let pairs = detected
            .pairs
            .into_iter()
            .filter(|pair| pair.status == PairStatus::Renamed)
            .map(|pair| RenamePair {
                side,
                old_path: pair.old_path.clone().unwrap(),
                new_path: pair.new_path.clone().unwrap(),
                old: VersionInfo::from_entry(pair.old.as_ref().unwrap()),
                new: VersionInfo::from_entry(pair.new.as_ref().unwrap()),
                score: pair.score,
            })
            .collect();

        Ok(pairs)
    }
}
