use crate::core::diff::similarity::{DEFAULT_RENAME_LIMIT, DEFAULT_RENAME_SCORE, MAX_SCORE};
use crate::errors::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRenameDetection {
    /// Never infer directory renames.
    None,
    /// Infer and apply them, reporting each moved path.
    Conflict,
    /// Infer and apply them silently.
    True,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursiveVariant {
    Normal,
    FavorOurs,
    FavorTheirs,
}

/// Everything that parameterizes a merge. Mirrors the knobs the CLI exposes;
/// validated once at merge start.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub detect_renames: bool,
    pub detect_directory_renames: DirRenameDetection,
    pub rename_limit: usize,
    pub rename_score: u32,
    pub recursive_variant: RecursiveVariant,
    pub renormalize: bool,
    pub subtree_shift: Option<String>,
    /// Label for the merge base in conflict markers. Overridden internally
    /// while folding multiple bases.
    pub ancestor: Option<String>,
    pub branch1: String,
    pub branch2: String,
    /// 0..=5; gates the diagnostic log.
    pub verbosity: u8,
    /// 0 = print immediately, 1 = buffer and flush at the end,
    /// 2 = buffer and hand to the caller.
    pub buffer_output: u8,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            detect_renames: true,
            detect_directory_renames: DirRenameDetection::Conflict,
            rename_limit: DEFAULT_RENAME_LIMIT,
            rename_score: DEFAULT_RENAME_SCORE,
            recursive_variant: RecursiveVariant::Normal,
            renormalize: false,
            subtree_shift: None,
            ancestor: None,
            branch1: "HEAD".to_string(),
            branch2: "other".to_string(),
            verbosity: 2,
            buffer_output: 1,
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.verbosity > 5 {
            return Err(Error::Config(format!(
                "verbosity must be 0..=5, got {}",
                self.verbosity
            )));
        }
        if self.buffer_output > 2 {
            return Err(Error::Config(format!(
                "buffer_output must be 0..=2, got {}",
                self.buffer_output
            )));
        }
        if self.rename_score > MAX_SCORE {
            return Err(Error::Config(format!(
                "rename_score must be 0..={}, got {}",
                MAX_SCORE, self.rename_score
            )));
        }
        if self.branch1.is_empty() || self.branch2.is_empty() {
            return Err(Error::Config("branch labels must not be empty".to_string()));
        }
        if let Some(prefix) = &self.subtree_shift {
            if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(Error::Config(format!(
                    "subtree_shift must be a bare path prefix, got '{}'",
                    prefix
                )));
            }
        }
        Ok(())
    }

    /// The configured rename limit, silently capped.
    pub fn effective_rename_limit(&self) -> usize {
        self.rename_limit.min(DEFAULT_RENAME_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(MergeOptions::default().validate().is_ok());
    }

    #[test]
    fn bad_score_rejected() {
        let opts = MergeOptions {
            rename_score: MAX_SCORE + 1,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn bad_subtree_prefix_rejected() {
        let opts = MergeOptions {
            subtree_shift: Some("/abs".to_string()),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
        let opts = MergeOptions {
            subtree_shift: Some(String::new()),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn oversized_rename_limit_is_capped() {
        let opts = MergeOptions {
            rename_limit: 1_000_000,
            ..Default::default()
        };
        assert_eq!(opts.effective_rename_limit(), DEFAULT_RENAME_LIMIT);
    }
}
