//! File-backed log backend.
//!
//! One JSON document per key under a root directory. Keys are
//! percent-encoded into filenames, so arbitrary room keys (including `/`
//! and `..`) cannot escape the root. Writes land in a sibling temp file and
//! are renamed into place, keeping the whole-document rewrite atomic at the
//! filesystem level.

use crate::traits::{DurableLog, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

/// A log store keeping one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileLog {
    root: PathBuf,
}

impl FileLog {
    /// Create a store rooted at `root`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 8);
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
                    name.push(byte as char);
                }
                _ => name.push_str(&format!("%{byte:02x}")),
            }
        }
        name.push_str(".json");
        self.root.join(name)
    }
}

#[async_trait]
impl DurableLog for FileLog {
    async fn get(&self, key: &str) -> Result<Vec<Value>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, messages: &[Value]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(messages)?;

        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;

        trace!(key = %key, bytes = bytes.len(), "Log document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_absent_key_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLog::new(dir.path());

        assert!(store.get("messages:missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLog::new(dir.path());

        let doc = vec![json!({"subject": "hi"}), json!({"subject": "again"})];
        store.put("messages:inbox", &doc).await.unwrap();

        assert_eq!(store.get("messages:inbox").await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_put_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLog::new(dir.path());

        store.put("messages:a", &[json!(1), json!(2)]).await.unwrap();
        store.put("messages:a", &[json!(3)]).await.unwrap();

        assert_eq!(store.get("messages:a").await.unwrap(), vec![json!(3)]);
    }

    #[tokio::test]
    async fn test_hostile_keys_stay_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLog::new(dir.path());

        let key = "messages:../../etc/passwd";
        store.put(key, &[json!({"x": 1})]).await.unwrap();

        // The encoded document landed inside the root, nowhere else
        let path = store.path_for(key);
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
        assert_eq!(store.get(key).await.unwrap(), vec![json!({"x": 1})]);
    }

    #[tokio::test]
    async fn test_corrupt_document_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLog::new(dir.path());

        store.put("messages:bad", &[json!(1)]).await.unwrap();
        std::fs::write(store.path_for("messages:bad"), b"not json").unwrap();

        assert!(matches!(
            store.get("messages:bad").await,
            Err(StorageError::Corrupt(_))
        ));
    }
}
