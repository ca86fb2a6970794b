use crate::core::file_mode::FileMode;

/// Flat (name, oid, mode) record exchanged between the database and the
/// merge machinery. The mode is kept as an octal string for serialization
/// compatibility, same as tree entries on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseEntry {
    pub name: String,
    pub oid: String,
    pub mode: String,
}

impl DatabaseEntry {
    pub fn new(name: String, oid: String, mode: &str) -> Self {
        let file_mode = FileMode::parse(mode);

        DatabaseEntry {
            name,
            oid,
            mode: file_mode.to_octal_string(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_oid(&self) -> &str {
        &self.oid
    }

    pub fn get_mode(&self) -> &str {
        &self.mode
    }

    pub fn get_file_mode(&self) -> FileMode {
        FileMode::parse(&self.mode)
    }
}
