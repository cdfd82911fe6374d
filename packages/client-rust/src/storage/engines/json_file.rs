//! File-backed [`LocalCache`] that persists all entries in one JSON document.
//!
//! Every mutation rewrites the document through a temporary file and a
//! rename, so a crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use stratum_core::{LocalCache, LocalCacheError};

/// Local cache stored as a JSON object of native key to raw value.
pub struct JsonFileCache {
    path: PathBuf,
    quota_bytes: Option<usize>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileCache {
    /// Opens (or lazily creates) the cache file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalCacheError::Io`] if the file exists but cannot be read,
    /// and [`LocalCacheError::Corrupt`] if it is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LocalCacheError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| LocalCacheError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            quota_bytes: None,
            entries: Mutex::new(entries),
        })
    }

    /// Limits the serialized document size.
    #[must_use]
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), LocalCacheError> {
        let encoded = serde_json::to_vec(entries)
            .map_err(|e| LocalCacheError::Corrupt(e.to_string()))?;
        if let Some(quota) = self.quota_bytes {
            if encoded.len() > quota {
                return Err(LocalCacheError::Quota {
                    needed: encoded.len(),
                    available: quota,
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalCache for JsonFileCache {
    fn get(&self, native_key: &str) -> Result<Option<String>, LocalCacheError> {
        Ok(self.entries.lock().get(native_key).cloned())
    }

    fn set(&self, native_key: &str, value: String) -> Result<(), LocalCacheError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(native_key.to_string(), value);
        if let Err(err) = self.persist(&entries) {
            // Roll back so memory never diverges from disk.
            match previous {
                Some(old) => entries.insert(native_key.to_string(), old),
                None => entries.remove(native_key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, native_key: &str) -> Result<(), LocalCacheError> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(native_key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&entries) {
            entries.insert(native_key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = JsonFileCache::open(&path).unwrap();
        cache.set("app:orders:u1", "[1]".to_string()).unwrap();
        cache.set("app:claims:u1", "{}".to_string()).unwrap();
        drop(cache);

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(
            reopened.get("app:orders:u1").unwrap().as_deref(),
            Some("[1]")
        );
        reopened.remove("app:claims:u1").unwrap();
        drop(reopened);

        let again = JsonFileCache::open(&path).unwrap();
        assert!(again.get("app:claims:u1").unwrap().is_none());
        assert_eq!(again.keys_with_prefix("app:"), vec!["app:orders:u1"]);
    }

    #[test]
    fn missing_file_starts_empty_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = JsonFileCache::open(&path).unwrap();
        assert!(cache.keys_with_prefix("").is_empty());
        cache.set("k", "v".to_string()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileCache::open(&path),
            Err(LocalCacheError::Corrupt(_))
        ));
    }

    #[test]
    fn quota_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::open(dir.path().join("cache.json"))
            .unwrap()
            .with_quota(32);
        cache.set("a", "1".to_string()).unwrap();

        let err = cache.set("b", "x".repeat(64)).unwrap_err();
        assert!(err.is_quota());
        assert!(cache.get("b").unwrap().is_none());
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn prefix_scan_stops_at_prefix_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::open(dir.path().join("c.json")).unwrap();
        for key in ["a:1", "app:1", "app:2", "b:1"] {
            cache.set(key, "v".to_string()).unwrap();
        }
        assert_eq!(cache.keys_with_prefix("app:"), vec!["app:1", "app:2"]);
    }
}
