//! Key/value storage the machine reads and writes through.
//!
//! The VM uses two stores: contract storage (SLOAD/SSTORE, keyed by the hex
//! of the storage address word) and the account index (a contract address
//! mapped to its storage root, plus `<address>:bytecode` mapped to the
//! serialized bytecode).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::lang::hash::Hash;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
}

/// Key/value storage interface for VM execution.
///
/// Keys are opaque strings. Implementations must make `root_hash`
/// depend only on the current contents, never on insertion order.
pub trait Storage {
    /// Retrieves a value by key, returning `None` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    /// Stores a key/value pair, overwriting any existing value.
    fn insert(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    /// Digest of the full contents.
    fn root_hash(&self) -> Result<Hash, StorageError>;
}

/// SHA-256 over the length-prefixed entries in key order.
fn root_of(entries: &BTreeMap<String, Vec<u8>>) -> Hash {
    let mut h = Hash::sha256();
    for (key, value) in entries {
        h.update(&(key.len() as u64).to_be_bytes());
        h.update(key.as_bytes());
        h.update(&(value.len() as u64).to_be_bytes());
        h.update(value);
    }
    h.finalize()
}

/// In-memory storage. Used by tests and the `run` command.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn insert(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn root_hash(&self) -> Result<Hash, StorageError> {
        Ok(root_of(&self.data))
    }
}

/// Storage persisted as one JSON object of hex-encoded values.
///
/// The whole file is rewritten on every insert.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: BTreeMap<String, Vec<u8>>,
}

impl FileStorage {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let encoded: BTreeMap<String, String> = serde_json::from_str(&text)
                .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?;
            encoded
                .into_iter()
                .map(|(key, value)| {
                    hex::decode(&value)
                        .map(|bytes| (key.clone(), bytes))
                        .map_err(|e| StorageError::Corrupt(format!("value of {}: {}", key, e)))
                })
                .collect::<Result<_, _>>()?
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = data.len(), "opened file storage");
        Ok(FileStorage { path, data })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn flush(&self) -> Result<(), StorageError> {
        let encoded: BTreeMap<&str, String> = self
            .data
            .iter()
            .map(|(key, value)| (key.as_str(), hex::encode(value)))
            .collect();
        let text = serde_json::to_string_pretty(&encoded)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write aside, then rename over the old file
        let staging = self.staging_path();
        fs::write(&staging, text)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn insert(&mut self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        trace!(key, bytes = value.len(), "file storage insert");
        self.data.insert(key.to_string(), value);
        self.flush()
    }

    fn root_hash(&self) -> Result<Hash, StorageError> {
        Ok(root_of(&self.data))
    }
}
