/// Flags shared by the merge commands; `None` means "use the engine
/// default".
#[derive(Debug, Default)]
pub struct MergeFlags {
    /// Base tree for merge-tree; unused by the recursive merge.
    pub base_tree: Option<String>,
    pub no_renames: bool,
    pub dir_renames: Option<String>,
    pub rename_limit: Option<usize>,
    pub rename_score: Option<u32>,
    pub favor: Option<String>,
    pub subtree: Option<String>,
    pub label_base: Option<String>,
    pub label1: Option<String>,
    pub label2: Option<String>,
    pub verbosity: Option<u8>,
    pub json: bool,
}

#[derive(Debug)]
pub enum Command {
    /// Recursive merge of two commits.
    Merge {
        git_dir: String,
        commit1: String,
        commit2: String,
        flags: MergeFlags,
    },
    /// Single-level merge of two trees against an explicit base tree.
    MergeTree {
        git_dir: String,
        base: String,
        tree1: String,
        tree2: String,
        flags: MergeFlags,
    },
    Unknown {
        name: String,
    },
}

#[derive(Debug)]
pub struct CliArgs {
    pub command: Command,
}
