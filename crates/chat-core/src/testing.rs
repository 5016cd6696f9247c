//! In-process port doubles and a session harness.
//!
//! Used by the unit tests, the wasm tests and by hosts that want to drive a
//! [`ChatSession`] without a browser.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chat_types::config::ChatConfig;
use chat_types::session::SessionDescriptor;
use chat_types::{ChatError, Result};
use serde_json::Value;

use crate::event_bus::{ChatEvent, EventBus};
use crate::ports::{Clock, ConnectionId, KeyValueStore, SocketEvent, SocketEventKind, SocketPort};
use crate::session::{ChatSession, SessionPorts};

// ─── Storage ─────────────────────────────────────────────────

/// Key-value store that can be told to reject writes
#[derive(Default)]
pub struct MemoryStore {
    data: RefCell<HashMap<String, String>>,
    reject_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.borrow().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.reject_writes.get() {
            return Err(ChatError::Storage("quota exceeded".to_string()));
        }
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.borrow_mut().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "test-memory"
    }
}

// ─── Socket ──────────────────────────────────────────────────

/// Records every call. Connections stay closed until [`ScriptedSocket::set_open`].
#[derive(Default)]
pub struct ScriptedSocket {
    next_id: Cell<u64>,
    urls: RefCell<HashMap<ConnectionId, String>>,
    open: RefCell<HashSet<ConnectionId>>,
    closed: RefCell<Vec<ConnectionId>>,
    sent: RefCell<Vec<(ConnectionId, String)>>,
    refuse_connect: Cell<bool>,
}

impl ScriptedSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.set(refuse);
    }

    pub fn set_open(&self, conn: ConnectionId, open: bool) {
        if open {
            self.open.borrow_mut().insert(conn);
        } else {
            self.open.borrow_mut().remove(&conn);
        }
    }

    pub fn connect_count(&self) -> usize {
        self.next_id.get() as usize
    }

    pub fn last_connection(&self) -> Option<ConnectionId> {
        self.next_id.get().checked_sub(1).map(ConnectionId)
    }

    pub fn url_of(&self, conn: ConnectionId) -> Option<String> {
        self.urls.borrow().get(&conn).cloned()
    }

    pub fn was_closed(&self, conn: ConnectionId) -> bool {
        self.closed.borrow().contains(&conn)
    }

    /// Every payload sent, in order, across all connections
    pub fn sent(&self) -> Vec<(ConnectionId, String)> {
        self.sent.borrow().clone()
    }
}

impl SocketPort for ScriptedSocket {
    fn connect(&self, url: &str) -> Result<ConnectionId> {
        if self.refuse_connect.get() {
            return Err(ChatError::Socket(format!("cannot reach {}", url)));
        }
        let id = ConnectionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.urls.borrow_mut().insert(id, url.to_string());
        Ok(id)
    }

    fn send(&self, conn: ConnectionId, text: &str) -> Result<()> {
        if !self.open.borrow().contains(&conn) {
            return Err(ChatError::Socket(format!("{:?} is not open", conn)));
        }
        self.sent.borrow_mut().push((conn, text.to_string()));
        Ok(())
    }

    fn is_open(&self, conn: ConnectionId) -> bool {
        self.open.borrow().contains(&conn)
    }

    fn close(&self, conn: ConnectionId) {
        self.open.borrow_mut().remove(&conn);
        self.closed.borrow_mut().push(conn);
    }
}

// ─── Clock ───────────────────────────────────────────────────

pub struct ManualClock {
    now_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(now_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

// ─── Harness ─────────────────────────────────────────────────

pub const TEST_URL: &str = "wss://chat.test/ws";
pub const TEST_CLIENT: &str = "client-1";
/// 2023-11-14T22:13:20Z
pub const TEST_EPOCH_MS: u64 = 1_700_000_000_000;

pub fn test_config() -> ChatConfig {
    ChatConfig {
        ws_url: Some(TEST_URL.to_string()),
        client_id: TEST_CLIENT.to_string(),
        ..ChatConfig::default()
    }
}

/// A session wired to in-memory ports, with helpers that play the server
pub struct TestClient {
    pub session: ChatSession,
    pub store: Rc<MemoryStore>,
    pub socket: Rc<ScriptedSocket>,
    pub clock: Rc<ManualClock>,
    pub bus: EventBus,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ChatConfig) -> Self {
        Self::with_store(config, Rc::new(MemoryStore::new()))
    }

    /// Build over an existing store, e.g. to simulate a reload or a second tab.
    pub fn with_store(config: ChatConfig, store: Rc<MemoryStore>) -> Self {
        let socket = Rc::new(ScriptedSocket::new());
        let clock = Rc::new(ManualClock::new(TEST_EPOCH_MS));
        let bus = EventBus::new();
        let ports = SessionPorts {
            storage: store.clone(),
            socket: socket.clone(),
            clock: clock.clone(),
        };
        Self {
            session: ChatSession::new(config, ports, bus.clone()),
            store,
            socket,
            clock,
            bus,
        }
    }

    pub fn now_secs(&self) -> i64 {
        self.clock.now_secs()
    }

    fn live(&self) -> ConnectionId {
        self.socket.last_connection().unwrap_or(ConnectionId(u64::MAX))
    }

    /// Mark the newest connection open and deliver its `Opened` event.
    pub fn open_socket(&mut self) {
        let conn = self.live();
        self.socket.set_open(conn, true);
        self.session.handle_socket_event(SocketEvent {
            connection: conn,
            kind: SocketEventKind::Opened,
        });
    }

    /// The newest connection goes away with a close frame.
    pub fn drop_socket(&mut self) {
        let conn = self.live();
        self.socket.set_open(conn, false);
        self.session.handle_socket_event(SocketEvent {
            connection: conn,
            kind: SocketEventKind::Closed {
                code: 1006,
                reason: String::new(),
            },
        });
    }

    pub fn frame(&mut self, conn: ConnectionId, text: &str) {
        self.session.handle_socket_event(SocketEvent {
            connection: conn,
            kind: SocketEventKind::Frame(text.to_string()),
        });
    }

    /// Deliver a `bump` envelope of `bump_type` with `data` on the newest connection.
    pub fn server_bump(&mut self, bump_type: &str, data: Value) {
        let envelope = serde_json::json!({
            "tag": "bump",
            "bump_type": bump_type,
            "bump_data": data,
        });
        let conn = self.live();
        self.frame(conn, &envelope.to_string());
    }

    pub fn server_history(&mut self, chat_id: &str, messages: Value) {
        let envelope = serde_json::json!({
            "tag": "existingMessages",
            "chat_id": chat_id,
            "messages": messages,
        });
        let conn = self.live();
        self.frame(conn, &envelope.to_string());
    }

    /// Start, open and confirm a chat in one go.
    pub fn start_active(&mut self, chat_id: &str) {
        self.session.start_chat("Ada", "42");
        self.open_socket();
        self.server_bump(
            "startChatSuccess",
            serde_json::json!({ "chat": chat_id, "token": "tok-1" }),
        );
    }

    /// Move the clock and fire whatever became due.
    pub fn advance(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.session.tick();
    }

    /// Outbound envelopes as JSON, oldest first
    pub fn sent(&self) -> Vec<Value> {
        self.socket
            .sent()
            .into_iter()
            .filter_map(|(_, text)| serde_json::from_str(&text).ok())
            .collect()
    }

    pub fn sent_tags(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|v| v["tag"].as_str().map(str::to_string))
            .collect()
    }

    pub fn stored(&self) -> Option<SessionDescriptor> {
        let raw = self.store.raw(&self.session.config().storage_key)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.bus.drain()
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
