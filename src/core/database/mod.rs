pub mod author;
pub mod blob;
pub mod commit;
pub mod database;
pub mod entry;
pub mod tree;
pub mod tree_diff;
pub mod tree_walk;
