//! Port traits at the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.
//!
//! Every port is synchronous. Browser storage is synchronous, socket sends are
//! fire-and-forget, and socket lifecycle is pushed back into the session as
//! [`SocketEvent`]s on the event loop.

use chat_types::Result;

// ─── Storage Port ────────────────────────────────────────────

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Socket Port ─────────────────────────────────────────────

/// Identifies one physical connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

pub trait SocketPort {
    /// Begin connecting. Lifecycle arrives later as [`SocketEvent`]s.
    fn connect(&self, url: &str) -> Result<ConnectionId>;

    fn send(&self, conn: ConnectionId, text: &str) -> Result<()>;

    /// True only while the connection is in the open state
    fn is_open(&self, conn: ConnectionId) -> bool;

    /// Close and forget the connection. Idempotent.
    fn close(&self, conn: ConnectionId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub connection: ConnectionId,
    pub kind: SocketEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    Opened,
    Frame(String),
    Closed { code: u16, reason: String },
    Error(String),
}

// ─── Clock Port ──────────────────────────────────────────────

pub trait Clock {
    /// Wall-clock milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;

    fn now_secs(&self) -> i64 {
        (self.now_ms() / 1000) as i64
    }
}
