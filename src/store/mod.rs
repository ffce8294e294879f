//! # Key-Value Store Module
//!
//! Durable key-value storage backed by a single JSON object file.
//!
//! Every operation goes back to disk, so several handles (or processes) bound
//! to the same path observe each other's writes. Writes replace the whole file
//! through a sibling temporary file and `rename`, so a reader never sees a
//! half-written document. Concurrent writers are last-write-wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TrackerError};

/// File-backed key-value store
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    path: PathBuf,
}

impl KeyValueStore {
    /// Bind a store to `path`. The file is created lazily on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value. Missing file or missing key yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the file is corrupt or the stored value has the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let map = self.read_map()?;
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| TrackerError::Store(format!("invalid value for '{}': {}", key, e))),
        }
    }

    /// Write a single value
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.edit(|map| {
            map.insert(key.to_string(), value);
        })
    }

    /// Remove a key. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.edit(|map| {
            map.remove(key);
        })
    }

    /// Remove every key
    pub fn clear(&self) -> Result<()> {
        self.edit(|map| map.clear())
    }

    /// Apply several changes and commit them in a single write
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use d_tracker::store::KeyValueStore;
    /// use serde_json::json;
    ///
    /// let store = KeyValueStore::open("/tmp/prefs.json");
    /// store.edit(|map| {
    ///     map.insert("baseline".to_string(), json!(1200.0));
    ///     map.insert("baseline_date".to_string(), json!("2024-05-01"));
    /// })?;
    /// # Ok::<(), d_tracker::error::TrackerError>(())
    /// ```
    pub fn edit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TrackerError::Store(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(TrackerError::Store(format!(
                "failed to parse {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        let contents = serde_json::to_vec_pretty(map)?;
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("Committed {} keys to {}", map.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}
