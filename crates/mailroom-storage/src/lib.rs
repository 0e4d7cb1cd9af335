//! # mailroom-storage
//!
//! Durable per-room message log storage for the Mailroom relay.
//!
//! A room's history is a single ordered document of opaque JSON messages,
//! addressed by a room-scoped key (`messages:{room}`). The contract is
//! deliberately small: read the whole document, replace the whole document.
//! Bounding the document is the caller's job (the room actor applies the
//! eviction policy before every write).
//!
//! Two backends are provided:
//!
//! - [`MemoryLog`] - process-local, for tests and ephemeral deployments
//! - [`FileLog`] - one JSON file per key under a root directory

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileLog;
pub use memory::MemoryLog;
pub use traits::{log_key, DurableLog, StorageError};
