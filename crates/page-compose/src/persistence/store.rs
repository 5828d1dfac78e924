//! Key-value stores the session record can live in

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Durable key-value storage for the session record
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    async fn put(&mut self, key: &str, value: Vec<u8>) -> io::Result<()>;
    async fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// In-memory store, optionally bounded to emulate a storage quota
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any single value larger than `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    async fn put(&mut self, key: &str, value: Vec<u8>) -> io::Result<()> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(io::Error::other(format!(
                    "quota exceeded: {} bytes > {} bytes",
                    value.len(),
                    quota
                )));
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Written to a temporary file first and renamed over the old value, so
    /// readers see either the previous or the new record
    async fn put(&mut self, key: &str, value: Vec<u8>) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value).await?;
        fs::rename(&temp_path, &path).await
    }

    async fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_quota() {
        let mut store = MemoryStore::with_quota(4);
        assert!(store.put("k", b"1234".to_vec()).await.is_ok());
        assert!(store.put("k", b"12345".to_vec()).await.is_err());
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"1234");
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("sessions"));

        assert!(store.get("my session").await.unwrap().is_none());
        store.put("my session", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("my session").await.unwrap().unwrap(), b"{}");
        assert!(!dir.path().join("sessions/my_session.tmp").exists());

        store.remove("my session").await.unwrap();
        assert!(store.get("my session").await.unwrap().is_none());
        // Removing again is not an error
        store.remove("my session").await.unwrap();
    }
}
