use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lazy_static::lazy_static;
use sha1::{Digest, Sha1};

use crate::core::database::blob::Blob;
use crate::core::database::commit::Commit;
use crate::core::database::entry::DatabaseEntry;
use crate::core::database::tree::{Tree, TreeEntry};
use crate::errors::error::Error;

lazy_static! {
    /// Object id of the tree with no entries.
    pub static ref EMPTY_TREE_OID: String = {
        let mut hasher = Sha1::new();
        hasher.update(b"tree 0\0");
        format!("{:x}", hasher.finalize())
    };
}

pub trait GitObject: Any {
    fn get_type(&self) -> &str;
    fn to_bytes(&self) -> Vec<u8>;
    fn set_oid(&mut self, oid: String);
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn GitObject>;
}

/// Loose-object store: zlib-compressed "<type> <size>\0<content>" files laid
/// out as objects/xx/yyyy..., addressed by the SHA-1 of the uncompressed
/// serialization. An in-memory cache sits in front of the files; objects
/// registered only in the cache (virtual commits) never touch disk.
pub struct Database {
    pub pathname: PathBuf,
    temp_chars: Vec<char>,
    objects: HashMap<String, Box<dyn GitObject>>,
}

impl Database {
    pub fn new(pathname: PathBuf) -> Self {
        let temp_chars: Vec<char> = ('a'..='z').chain('A'..='Z').chain('0'..='9').collect();

        Database {
            pathname,
            temp_chars,
            objects: HashMap::new(),
        }
    }

    pub fn exists(&self, oid: &str) -> bool {
        self.objects.contains_key(oid) || self.object_path(oid).exists()
    }

    pub fn load(&mut self, oid: &str) -> Result<Box<dyn GitObject>, Error> {
        if let Some(obj) = self.objects.get(oid) {
            return Ok(obj.clone_box());
        }

        let object = self.read_object(oid)?;
        let result = object.clone_box();
        self.objects.insert(oid.to_string(), object);

        Ok(result)
    }

    /// Store an object permanently and return its oid. Writing is skipped
    /// only when the file itself already exists; a cache-only object still
    /// gets persisted.
    pub fn store(&mut self, object: &mut impl GitObject) -> Result<String, Error> {
        let content = self.serialize_object(object);
        let oid = self.hash_content(&content);

        self.write_object(&oid, &content)?;

        object.set_oid(oid.clone());
        self.objects.insert(oid.clone(), object.clone_box());
        Ok(oid)
    }

    /// Hash an object and register it in the cache without writing it to
    /// disk. Virtual commits synthesized during recursive merging are held
    /// this way: ancestry walks can load them, nothing persists.
    pub fn store_in_memory(&mut self, object: &mut impl GitObject) -> String {
        let content = self.serialize_object(object);
        let oid = self.hash_content(&content);

        object.set_oid(oid.clone());
        self.objects.insert(oid.clone(), object.clone_box());
        oid
    }

    pub fn serialize_object(&self, object: &impl GitObject) -> Vec<u8> {
        let content = object.to_bytes();
        let header = format!("{} {}\0", object.get_type(), content.len());
        let mut full_content = header.as_bytes().to_vec();
        full_content.extend_from_slice(&content);
        full_content
    }

    pub fn hash_content(&self, content: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    fn write_object(&self, oid: &str, content: &[u8]) -> Result<(), Error> {
        let object_path = self.object_path(oid);

        if object_path.exists() {
            return Ok(());
        }

        let dirname = object_path.parent().ok_or_else(|| {
            Error::Generic(format!("Invalid object path: {}", object_path.display()))
        })?;

        if !dirname.exists() {
            fs::create_dir_all(dirname)?;
        }

        let temp_path = dirname.join(self.generate_temp_name());
        let mut file = File::create(&temp_path)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(content)?;
        let compressed = encoder.finish()?;

        file.write_all(&compressed)?;
        fs::rename(temp_path, object_path)?;

        Ok(())
    }

    fn object_path(&self, oid: &str) -> PathBuf {
        self.pathname.join(&oid[0..2]).join(&oid[2..])
    }

    fn read_object(&self, oid: &str) -> Result<Box<dyn GitObject>, Error> {
        let path = self.object_path(oid);

        if !path.exists() {
            return Err(Error::InvalidObject(format!("Object not found: {}", oid)));
        }

        let mut file = File::open(&path)?;
        let mut compressed_data = Vec::new();
        file.read_to_end(&mut compressed_data)?;

        let mut decoder = ZlibDecoder::new(&compressed_data[..]);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;

        let null_pos = data.iter().position(|&b| b == 0).ok_or_else(|| {
            Error::InvalidObject("Invalid object format: missing null byte".to_string())
        })?;

        let header = std::str::from_utf8(&data[0..null_pos])
            .map_err(|_| Error::InvalidObject("Invalid header encoding".to_string()))?;

        let parts: Vec<&str> = header.split(' ').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidObject(format!(
                "Invalid header format: {}",
                header
            )));
        }

        let content = &data[null_pos + 1..];

        let mut object: Box<dyn GitObject> = match parts[0] {
            "blob" => Box::new(Blob::parse(content)),
            "tree" => Box::new(Tree::parse(content)?),
            "commit" => Box::new(Commit::parse(content)?),
            _ => {
                return Err(Error::InvalidObject(format!(
                    "Unknown object type: {}",
                    parts[0]
                )))
            }
        };

        object.set_oid(oid.to_string());
        Ok(object)
    }

    fn generate_temp_name(&self) -> String {
        use rand::seq::SliceRandom;
        let mut rng = rand::thread_rng();
        let name: String = (0..6)
            .map(|_| self.temp_chars.choose(&mut rng).unwrap())
            .collect();
        format!("tmp_obj_{}", name)
    }

    /// Flat entries of a tree, sorted by name. A commit oid resolves through
    /// its tree; `None` or the empty-tree oid yields no entries.
    pub fn tree_entries(
        &mut self,
        oid: Option<&str>,
    ) -> Result<BTreeMap<String, DatabaseEntry>, Error> {
        let oid = match oid {
            Some(oid) if oid != EMPTY_TREE_OID.as_str() => oid.to_string(),
            _ => return Ok(BTreeMap::new()),
        };

        let object = self.load(&oid)?;
        let tree_obj;
        let tree = match object.get_type() {
            "commit" => {
                let commit = object
                    .as_any()
                    .downcast_ref::<Commit>()
                    .ok_or_else(|| Error::InvalidObject(format!("Bad commit object: {}", oid)))?;
                tree_obj = self.load(commit.get_tree())?;
                tree_obj
                    .as_any()
                    .downcast_ref::<Tree>()
                    .ok_or_else(|| Error::InvalidObject(format!("Bad tree in commit {}", oid)))?
            }
            "tree" => object
                .as_any()
                .downcast_ref::<Tree>()
                .ok_or_else(|| Error::InvalidObject(format!("Bad tree object: {}", oid)))?,
            other => {
                return Err(Error::InvalidObject(format!(
                    "Object {} is neither commit nor tree ({})",
                    oid, other
                )))
            }
        };

        let mut entries = BTreeMap::new();
        for (name, entry) in tree.get_entries() {
            match entry {
                TreeEntry::Blob(entry_oid, mode) => {
                    entries.insert(
                        name.clone(),
                        DatabaseEntry::new(name.clone(), entry_oid.clone(), &mode.to_octal_string()),
                    );
                }
                TreeEntry::Tree(subtree) => {
                    if let Some(subtree_oid) = subtree.get_oid() {
                        entries.insert(
                            name.clone(),
                            DatabaseEntry::new(name.clone(), subtree_oid.clone(), "40000"),
                        );
                    }
                }
            }
        }

        Ok(entries)
    }

    /// Resolve a commit-or-tree oid to a tree oid.
    pub fn tree_oid_of(&mut self, oid: &str) -> Result<String, Error> {
        let object = self.load(oid)?;
        match object.get_type() {
            "commit" => {
                let commit = object
                    .as_any()
                    .downcast_ref::<Commit>()
                    .ok_or_else(|| Error::InvalidObject(format!("Bad commit object: {}", oid)))?;
                Ok(commit.get_tree().to_string())
            }
            "tree" => Ok(oid.to_string()),
            other => Err(Error::InvalidObject(format!(
                "Object {} is neither commit nor tree ({})",
                oid, other
            ))),
        }
    }

    /// Raw bytes of a blob.
    pub fn read_blob_bytes(&mut self, oid: &str) -> Result<Vec<u8>, Error> {
        let object = self.load(oid)?;
        if object.get_type() != "blob" {
            return Err(Error::InvalidObject(format!("Object {} is not a blob", oid)));
        }
        Ok(object.to_bytes())
    }

    /// Every object id present on disk, sorted. Walks the fan-out
    /// directories; cache-only objects (virtual commits) are not included.
    pub fn list_object_ids(&self) -> Result<Vec<String>, Error> {
        let mut ids = Vec::new();
        if !self.pathname.is_dir() {
            return Ok(ids);
        }
        for dir_entry in fs::read_dir(&self.pathname)?.flatten() {
            let dir_name = dir_entry.file_name().to_string_lossy().to_string();
            if dir_name.len() != 2 || !dir_name.chars().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            for file_entry in fs::read_dir(dir_entry.path())?.flatten() {
                let file_name = file_entry.file_name().to_string_lossy().to_string();
                if file_name.len() == 38 {
                    ids.push(format!("{}{}", dir_name, file_name));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn prefix_match(&self, prefix: &str) -> Result<Vec<String>, Error> {
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) || prefix.len() < 2 {
            return Ok(Vec::new());
        }

        let dir_name = &prefix[0..2];
        let dir_path = self.pathname.join(dir_name);

        if !dir_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&dir_path)?.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let full_id = format!("{}{}", dir_name, file_name);
            if full_id.starts_with(prefix) {
                matches.push(full_id);
            }
        }

        Ok(matches)
    }

    /// Expand a possibly abbreviated oid to a full one.
    pub fn resolve_oid(&self, partial_oid: &str) -> Result<String, Error> {
        if partial_oid.len() == 40 && partial_oid.chars().all(|c| c.is_ascii_hexdigit()) {
            if self.exists(partial_oid) {
                return Ok(partial_oid.to_string());
            }
        }

        if partial_oid.len() >= 4 && partial_oid.chars().all(|c| c.is_ascii_hexdigit()) {
            let matches = self.prefix_match(partial_oid)?;

            if matches.is_empty() {
                return Err(Error::Generic(format!(
                    "No object found with prefix {}",
                    partial_oid
                )));
            }
            if matches.len() > 1 {
                return Err(Error::Generic(format!(
                    "Ambiguous object prefix: {} matches multiple objects",
                    partial_oid
                )));
            }
            return Ok(matches[0].clone());
        }

        Err(Error::Generic(format!(
            "Invalid object identifier: {}",
            partial_oid
        )))
    }

    pub fn short_oid(&self, oid: &str) -> String {
        if oid.len() <= 7 {
            oid.to_string()
        } else {
            oid[0..7].to_string()
        }
    }
}
