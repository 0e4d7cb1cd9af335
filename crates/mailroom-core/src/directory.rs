//! Room directory: key to actor resolution.
//!
//! Maps a room key to its live actor handle, spawning the actor lazily on
//! first resolve. The same key always resolves to the same actor for the
//! life of the process; eviction of idle actors is deliberately not handled
//! here.

use crate::room::{spawn_room, RoomConfig, RoomHandle};
use dashmap::DashMap;
use mailroom_storage::DurableLog;
use std::sync::Arc;
use tracing::debug;

/// Lazily creating registry of room actors.
pub struct RoomDirectory {
    rooms: DashMap<String, RoomHandle>,
    storage: Arc<dyn DurableLog>,
    config: RoomConfig,
}

impl RoomDirectory {
    /// Create a directory whose rooms persist through `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn DurableLog>, config: RoomConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            storage,
            config,
        }
    }

    /// Resolve a room key to its actor, spawning it on first access.
    ///
    /// Keys are opaque and case-sensitive; no normalization happens here.
    #[must_use]
    pub fn resolve(&self, key: &str) -> RoomHandle {
        self.rooms
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(room = %key, "Creating room actor");
                spawn_room(key, Arc::clone(&self.storage), self.config.clone())
            })
            .clone()
    }

    /// Number of live room actors.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Check whether a room actor exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.rooms.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailroom_storage::MemoryLog;
    use serde_json::json;

    fn directory() -> RoomDirectory {
        RoomDirectory::new(Arc::new(MemoryLog::new()), RoomConfig::default())
    }

    #[tokio::test]
    async fn test_resolve_creates_lazily() {
        let directory = directory();
        assert_eq!(directory.room_count(), 0);

        let _room = directory.resolve("inbox-1");
        assert_eq!(directory.room_count(), 1);
        assert!(directory.contains("inbox-1"));
    }

    #[tokio::test]
    async fn test_same_key_same_actor() {
        let directory = directory();

        let first = directory.resolve("inbox-1");
        first.ingest(json!({"n": 1})).await.unwrap();

        // A second resolve reaches the same actor and sees its log
        let second = directory.resolve("inbox-1");
        assert_eq!(second.stats().await.unwrap().log_len, 1);
        assert_eq!(directory.room_count(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_case_sensitive() {
        let directory = directory();

        let upper = directory.resolve("Inbox");
        upper.ingest(json!({"n": 1})).await.unwrap();

        let lower = directory.resolve("inbox");
        assert_eq!(lower.stats().await.unwrap().log_len, 0);
        assert_eq!(directory.room_count(), 2);
    }
}
