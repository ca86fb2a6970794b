pub mod bases;
pub mod collect;
pub mod common_ancestors;
pub mod content;
pub mod diff3;
pub mod dir_rename;
pub mod options;
pub mod path_info;
pub mod process_renames;
pub mod recursive;
pub mod renames;
pub mod resolve;
pub mod tree_writer;

pub use options::{DirRenameDetection, MergeOptions, RecursiveVariant};
pub use path_info::UnmergedEntry;
pub use recursive::{Merge, MergeOutcome};
