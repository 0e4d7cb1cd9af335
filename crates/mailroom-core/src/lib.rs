//! # mailroom-core
//!
//! Room actors, session registry, and message fan-out for the Mailroom
//! realtime relay.
//!
//! Every room key owns exactly one actor task; all mutation for a key flows
//! through that actor's mailbox, so log order is arrival order and no
//! external locking exists anywhere. Different keys run fully in parallel.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │   Gateways   │────▶│ RoomDirectory │────▶│    RoomActor    │
//! └──────────────┘     └───────────────┘     └─────────────────┘
//!                                              │             │
//!                                              ▼             ▼
//!                                      ┌────────────┐ ┌─────────────────┐
//!                                      │ DurableLog │ │ SessionRegistry │
//!                                      └────────────┘ └─────────────────┘
//! ```

pub mod directory;
pub mod protocol;
pub mod room;
pub mod session;

pub use directory::RoomDirectory;
pub use protocol::HistoryFrame;
pub use room::{spawn_room, RoomConfig, RoomError, RoomHandle, RoomStats};
pub use session::{Session, SessionId, SessionRegistry, SessionState};
