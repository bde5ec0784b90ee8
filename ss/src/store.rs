//! Core key/value store implementation

use eyre::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A key/value store rooted at a directory, one JSON document per key
pub struct Store {
    /// Base path for storage
    root: PathBuf,
}

/// Keys become file names, so restrict them to a safe alphabet
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre::eyre!("Empty store key"));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre::eyre!("Invalid store key '{}': only [A-Za-z0-9_-] allowed", key));
    }
    Ok(())
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root).context("Failed to create store directory")?;
        debug!(?root, "Opened store");
        Ok(Self { root })
    }

    /// The store's base directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Read a value, returning `None` if the key has never been written
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        let path = self.key_path(key);
        if !path.exists() {
            debug!(%key, "get: key absent");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).context(format!("Failed to read key '{}'", key))?;
        let value = serde_json::from_str(&content).context(format!("Failed to parse key '{}'", key))?;
        Ok(Some(value))
    }

    /// Write a value atomically (temp file + rename)
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        validate_key(key)?;
        let json = serde_json::to_string_pretty(value).context(format!("Failed to serialize key '{}'", key))?;

        let tmp = self.root.join(format!(".{}.{}.tmp", key, Uuid::now_v7()));
        fs::write(&tmp, &json).context(format!("Failed to write temp file for key '{}'", key))?;
        fs::rename(&tmp, self.key_path(key)).context(format!("Failed to commit key '{}'", key))?;

        debug!(%key, bytes = json.len(), "set: wrote key");
        Ok(())
    }

    /// Remove a key; returns whether it existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = self.key_path(key);
        if !path.exists() {
            debug!(%key, "remove: key absent");
            return Ok(false);
        }
        fs::remove_file(&path).context(format!("Failed to remove key '{}'", key))?;
        debug!(%key, "remove: removed key");
        Ok(true)
    }

    /// List all keys currently present, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root).context("Failed to read store directory")? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json")
                && validate_key(stem).is_ok()
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        enabled: bool,
    }

    #[test]
    fn test_get_absent_key_returns_none() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let value: Option<bool> = store.get("missing").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let sample = Sample {
            name: "ChatGPT".to_string(),
            enabled: true,
        };
        store.set("sample", &sample).unwrap();

        let read: Option<Sample> = store.get("sample").unwrap();
        assert_eq!(read, Some(sample));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.set("flag", &true).unwrap();
        store.set("flag", &false).unwrap();

        let read: Option<bool> = store.get("flag").unwrap();
        assert_eq!(read, Some(false));
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp = tempdir().unwrap();

        {
            let store = Store::open(temp.path()).unwrap();
            store.set("syncEnabled", &false).unwrap();
        }

        let store = Store::open(temp.path()).unwrap();
        let read: Option<bool> = store.get("syncEnabled").unwrap();
        assert_eq!(read, Some(false));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.set("gone", &1u32).unwrap();
        assert!(store.remove("gone").unwrap());
        assert!(!store.remove("gone").unwrap());

        let read: Option<u32> = store.get("gone").unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_keys_sorted() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.set("services", &1u32).unwrap();
        store.set("dashboardContainerId", &2u32).unwrap();
        store.set("syncEnabled", &3u32).unwrap();

        let keys = store.keys().unwrap();
        assert_eq!(keys, vec!["dashboardContainerId", "services", "syncEnabled"]);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        assert!(store.set("", &1u32).is_err());
        assert!(store.set("../escape", &1u32).is_err());
        assert!(store.set("a/b", &1u32).is_err());
        let read: Result<Option<u32>> = store.get("a/b");
        assert!(read.is_err());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.set("flag", &true).unwrap();
        store.set("flag", &false).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
