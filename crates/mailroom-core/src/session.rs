//! Sessions and the per-room session registry.
//!
//! A session is the actor-side handle to one live connection: an id plus an
//! unbounded sender feeding that connection's socket writer task. Sessions
//! are ephemeral, belong to exactly one room, and are never persisted.
//! Dead-session detection is reactive: a session is discovered dead on its
//! first failed send and dropped from the registry on the spot.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::debug;

/// Counter to keep ids unique within the same nanosecond.
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("sess_{:x}_{:x}", timestamp, counter))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session. `Closed` is terminal; a client that wants back
/// in must re-dial and gets a fresh history replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded but not yet registered with a room.
    Connecting,
    /// Registered; receiving broadcasts.
    Open,
    /// Removed after close, error, or a failed send.
    Closed,
}

/// A live connection to one room.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    outbound: mpsc::UnboundedSender<String>,
    state: SessionState,
}

impl Session {
    /// Create a session wrapping the connection's outbound channel.
    #[must_use]
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: SessionId::generate(),
            outbound,
            state: SessionState::Connecting,
        }
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Queue a text frame for delivery. Fails if the connection's writer
    /// task is gone.
    fn send(&self, text: String) -> Result<(), SessionGone> {
        self.outbound.send(text).map_err(|_| SessionGone)
    }

    fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

/// Marker for a send into a dead connection.
#[derive(Debug)]
struct SessionGone;

/// Result of one broadcast pass over the registry.
#[derive(Debug, Default)]
pub struct BroadcastOutcome {
    /// Sessions that accepted the frame.
    pub delivered: usize,
    /// Sessions dropped on send failure.
    pub dropped: Vec<SessionId>,
}

/// The set of live sessions for one room.
///
/// Owned exclusively by the room's actor; all mutation arrives through the
/// actor's serialized entry points, so no locking lives here.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Register a session, transitioning it to `Open`.
    pub fn add(&mut self, mut session: Session) {
        session.state = SessionState::Open;
        debug!(session = %session.id, "Session registered");
        self.sessions.insert(session.id.clone(), session);
    }

    /// Remove a session, transitioning it to `Closed`. Returns the session
    /// if it was registered.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id).map(|mut session| {
            session.close();
            debug!(session = %id, "Session removed");
            session
        })
    }

    /// Send a frame to one session, dropping it on failure.
    ///
    /// Returns `true` if the frame was accepted.
    pub fn send_to(&mut self, id: &SessionId, text: &str) -> bool {
        let Some(session) = self.sessions.get(id) else {
            return false;
        };
        if session.send(text.to_string()).is_ok() {
            true
        } else {
            self.remove(id);
            false
        }
    }

    /// Send a frame to every session.
    ///
    /// Failures are isolated per session: a failed send drops that session
    /// and delivery continues with the rest. No retries, no acks.
    pub fn broadcast(&mut self, text: &str) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        self.sessions.retain(|id, session| {
            if session.send(text.to_string()).is_ok() {
                outcome.delivered += 1;
                true
            } else {
                session.close();
                outcome.dropped.push(id.clone());
                false
            }
        });

        for id in &outcome.dropped {
            debug!(session = %id, "Dropped dead session during broadcast");
        }

        outcome
    }
}
