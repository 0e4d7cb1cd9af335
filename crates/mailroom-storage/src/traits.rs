//! Storage abstraction for durable room logs.
//!
//! The trait mirrors the externally observable persistence model: a room's
//! log is one ordered document, read and rewritten whole. Backends must be
//! safe to share behind an `Arc` across room actors; per-key write ordering
//! is guaranteed by the actors themselves (one writer per key).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Derive the storage key for a room's message log.
#[must_use]
pub fn log_key(room: &str) -> String {
    format!("messages:{room}")
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document exists but cannot be decoded.
    #[error("corrupt log document: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A durable write exceeded its deadline.
    #[error("durable write timed out")]
    Timeout,
}

/// A persisted, per-room message log.
///
/// `get` returns the full stored sequence for a key, empty if the key has
/// never been written. `put` replaces the entire stored sequence; there are
/// no partial-write semantics, and a failed `put` leaves handling to the
/// caller.
#[async_trait]
pub trait DurableLog: Send + Sync {
    /// Fetch the stored message sequence for `key`.
    async fn get(&self, key: &str) -> Result<Vec<Value>, StorageError>;

    /// Replace the stored message sequence for `key`.
    async fn put(&self, key: &str, messages: &[Value]) -> Result<(), StorageError>;
}
