use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::StorageError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Int(i64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put(String, StoredValue),
    Delete(String),
}

/// Group of writes that a [`KeyValueStore`] applies all together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.ops
            .push(WriteOp::Put(key.to_owned(), StoredValue::Int(value)));
        self
    }

    pub fn put_text(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.ops
            .push(WriteOp::Put(key.to_owned(), StoredValue::Text(value.into())));
        self
    }

    pub fn delete(&mut self, key: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete(key.to_owned()));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn apply_to(self, values: &mut BTreeMap<String, StoredValue>) {
        for op in self.ops {
            match op {
                WriteOp::Put(key, value) => {
                    values.insert(key, value);
                }
                WriteOp::Delete(key) => {
                    values.remove(&key);
                }
            }
        }
    }
}

/// Persistent key/value medium behind the progress gateway.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<&StoredValue>;

    /// Applies every write of `batch`; on error none of them is visible.
    fn commit(&mut self, batch: WriteBatch) -> Result<(), StorageError>;

    fn get_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Int(value)) => Ok(Some(*value)),
            Some(StoredValue::Text(_)) => Err(StorageError::WrongType {
                key: key.to_owned(),
                expected: "an integer",
            }),
        }
    }

    fn get_text(&self, key: &str) -> Result<Option<&str>, StorageError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Text(value)) => Ok(Some(value.as_str())),
            Some(StoredValue::Int(_)) => Err(StorageError::WrongType {
                key: key.to_owned(),
                expected: "a string",
            }),
        }
    }
}

/// Store that lives and dies with the process.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    values: BTreeMap<String, StoredValue>,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.values.get(key)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), StorageError> {
        batch.apply_to(&mut self.values);
        self.commits += 1;
        Ok(())
    }
}

/// Store persisted as one JSON object per file.
///
/// Every commit rewrites the whole file through a temporary sibling and a rename, and only then updates the cached
/// values, so a failed write leaves both the file and the cache as they were.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, StoredValue>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.values.get(key)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut values = self.values.clone();
        batch.apply_to(&mut values);

        let json = serde_json::to_string_pretty(&values)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        self.values = values;
        Ok(())
    }
}
