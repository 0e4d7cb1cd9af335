//! Per-room actor: the single serialization point for a room key.
//!
//! Each room runs as one spawned task owning its durable log cache and its
//! session registry. Operations arrive as commands over a bounded mailbox
//! and execute one at a time in arrival order; rooms with different keys
//! share nothing and run fully in parallel.
//!
//! Ordering guarantee: a message is durably committed before it is
//! broadcast, so no live session can observe a message that is not
//! recoverable from the log. The one benign exception is a connecting
//! session's history snapshot, which is taken at connect time and may race
//! an in-flight ingest.

use crate::protocol::HistoryFrame;
use crate::session::{Session, SessionId, SessionRegistry};
use mailroom_storage::{log_key, DurableLog, StorageError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Tunables for one room actor.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Log length that triggers eviction when exceeded.
    pub log_high_water: usize,
    /// Entries kept after an eviction.
    pub log_retain: usize,
    /// Maximum entries in a history replay.
    pub history_limit: usize,
    /// Command mailbox capacity; senders block when full.
    pub mailbox_capacity: usize,
    /// Deadline for the durable write inside an ingest. A hung write would
    /// otherwise stall every later operation on the room.
    pub persist_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            // Asymmetric on purpose: the log grows freely to the high-water
            // mark, then gets cut back to the retained tail in one step.
            log_high_water: 10_000,
            log_retain: 100,
            history_limit: 100,
            mailbox_capacity: 256,
            persist_timeout: Duration::from_secs(5),
        }
    }
}

/// Room operation errors.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The room's actor task is gone.
    #[error("room is gone")]
    RoomGone,

    /// Durable log failure; the ingest was aborted and nothing was
    /// broadcast.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Frame encoding failure.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Commands accepted by a room actor.
enum RoomCommand {
    Connect {
        session: Session,
    },
    Disconnect {
        session: SessionId,
    },
    Ingest {
        message: Value,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },
    Stats {
        reply: oneshot::Sender<RoomStats>,
    },
}

/// Point-in-time view of a room.
#[derive(Debug, Clone, Copy)]
pub struct RoomStats {
    /// Registered live sessions.
    pub sessions: usize,
    /// Entries in the actor's in-memory log cache. Reads 0 until the first
    /// connect or ingest loads the log, and again after a failed persist
    /// discards the cache; the durable log may be non-empty in both cases.
    pub log_len: usize,
}

/// Cloneable handle to one room's actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    key: String,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room key this handle addresses.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Register a session with the room. The actor replays history to the
    /// session after registration; this call does not wait for that.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::RoomGone`] if the actor has stopped.
    pub async fn connect(&self, session: Session) -> Result<(), RoomError> {
        self.tx
            .send(RoomCommand::Connect { session })
            .await
            .map_err(|_| RoomError::RoomGone)
    }

    /// Remove a session after its socket closed or errored.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::RoomGone`] if the actor has stopped.
    pub async fn disconnect(&self, session: SessionId) -> Result<(), RoomError> {
        self.tx
            .send(RoomCommand::Disconnect { session })
            .await
            .map_err(|_| RoomError::RoomGone)
    }

    /// Append a message to the room's log, persist it, and broadcast it to
    /// every live session. Returns the number of sessions that accepted the
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the durable write failed or timed out; in
    /// that case nothing was broadcast and the caller may retry.
    pub async fn ingest(&self, message: Value) -> Result<usize, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Ingest { message, reply })
            .await
            .map_err(|_| RoomError::RoomGone)?;
        rx.await.map_err(|_| RoomError::RoomGone)?
    }

    /// Fetch a point-in-time view of the room.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::RoomGone`] if the actor has stopped.
    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Stats { reply })
            .await
            .map_err(|_| RoomError::RoomGone)?;
        rx.await.map_err(|_| RoomError::RoomGone)
    }
}

/// Spawn the actor task for a room and return its handle.
#[must_use]
pub fn spawn_room(
    key: impl Into<String>,
    storage: Arc<dyn DurableLog>,
    config: RoomConfig,
) -> RoomHandle {
    let key = key.into();
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);

    let actor = RoomActor {
        key: key.clone(),
        storage,
        config,
        registry: SessionRegistry::new(),
        log: None,
    };
    tokio::spawn(actor.run(rx));

    RoomHandle { key, tx }
}

/// State owned by one room's task.
struct RoomActor {
    key: String,
    storage: Arc<dyn DurableLog>,
    config: RoomConfig,
    registry: SessionRegistry,
    /// Cache of the durable log, loaded on first use. `None` also after a
    /// failed persist, forcing a reload of durable truth.
    log: Option<Vec<Value>>,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        debug!(room = %self.key, "Room actor started");

        while let Some(cmd) = rx.recv().await {
            match cmd {
                RoomCommand::Connect { session } => self.handle_connect(session).await,
                RoomCommand::Disconnect { session } => {
                    self.registry.remove(&session);
                }
                RoomCommand::Ingest { message, reply } => {
                    let _ = reply.send(self.handle_ingest(message).await);
                }
                RoomCommand::Stats { reply } => {
                    let _ = reply.send(RoomStats {
                        sessions: self.registry.len(),
                        log_len: self.log.as_ref().map(Vec::len).unwrap_or_default(),
                    });
                }
            }
        }

        debug!(room = %self.key, "Room actor stopped");
    }

    async fn handle_connect(&mut self, session: Session) {
        let id = session.id().clone();
        self.registry.add(session);
        debug!(room = %self.key, session = %id, sessions = self.registry.len(), "Session connected");

        // History goes out after registration, built from whatever is
        // committed at this instant. The send is an unbounded-channel
        // write, so neither the actor nor the caller's handshake waits on
        // the socket.
        match self.history_text().await {
            Ok(text) => {
                if !self.registry.send_to(&id, &text) {
                    warn!(room = %self.key, session = %id, "History delivery failed");
                }
            }
            Err(e) => {
                // The session stays registered for live traffic even when
                // the stored history cannot be read.
                warn!(room = %self.key, session = %id, error = %e, "History unavailable");
            }
        }
    }

    async fn history_text(&mut self) -> Result<String, RoomError> {
        let limit = self.config.history_limit;
        let log = self.log_mut().await?;
        let frame = HistoryFrame::from_log(log, limit);
        Ok(frame.encode()?)
    }

    async fn handle_ingest(&mut self, message: Value) -> Result<usize, RoomError> {
        let text = serde_json::to_string(&message)?;
        let key = log_key(&self.key);
        let high_water = self.config.log_high_water;
        let retain = self.config.log_retain;

        {
            let log = self.log_mut().await?;
            log.push(message);
            if log.len() > high_water {
                // Saturate: a retain count above the high-water mark must
                // not underflow into a panic that kills the actor.
                let cut = log.len().saturating_sub(retain);
                log.drain(..cut);
                debug!(room = %self.key, evicted = cut, retained = retain, "Log trimmed");
            }
        }

        // Commit before broadcast. On failure the cached log is discarded
        // so the next operation reloads durable truth, which still lacks
        // this message.
        let snapshot = self.log.as_deref().unwrap_or_default();
        let persisted = tokio::time::timeout(
            self.config.persist_timeout,
            self.storage.put(&key, snapshot),
        )
        .await;

        match persisted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(room = %self.key, error = %e, "Durable write failed; ingest aborted");
                self.log = None;
                return Err(e.into());
            }
            Err(_) => {
                warn!(room = %self.key, "Durable write timed out; ingest aborted");
                self.log = None;
                return Err(StorageError::Timeout.into());
            }
        }

        let outcome = self.registry.broadcast(&text);
        trace!(
            room = %self.key,
            delivered = outcome.delivered,
            dropped = outcome.dropped.len(),
            "Message broadcast"
        );

        Ok(outcome.delivered)
    }

    async fn log_mut(&mut self) -> Result<&mut Vec<Value>, StorageError> {
        if self.log.is_none() {
            let stored = self.storage.get(&log_key(&self.key)).await?;
            debug!(room = %self.key, entries = stored.len(), "Log loaded");
            self.log = Some(stored);
        }
        Ok(self.log.get_or_insert_with(Vec::new))
    }
}
