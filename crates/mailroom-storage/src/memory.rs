//! In-memory log backend.
//!
//! Backs tests and ephemeral deployments. Documents live in a `DashMap`
//! keyed by the room-scoped log key; nothing survives a restart.

use crate::traits::{DurableLog, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// A process-local, non-durable log store.
#[derive(Debug, Default)]
pub struct MemoryLog {
    documents: DashMap<String, Vec<Value>>,
}

impl MemoryLog {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a stored document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check whether the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DurableLog for MemoryLog {
    async fn get(&self, key: &str) -> Result<Vec<Value>, StorageError> {
        Ok(self
            .documents
            .get(key)
            .map(|doc| doc.clone())
            .unwrap_or_default())
    }

    async fn put(&self, key: &str, messages: &[Value]) -> Result<(), StorageError> {
        self.documents.insert(key.to_string(), messages.to_vec());
        Ok(())
    }
}
