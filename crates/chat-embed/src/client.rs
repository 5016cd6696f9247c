//! `ChatClient`: the JS-facing handle around one [`ChatSession`].
//!
//! Every input reaches the session on the browser event loop:
//! - host calls (`startChat`, `sendMessage`, ...) run synchronously
//! - socket and storage events arrive through channels and are pumped by a
//!   `spawn_local` task
//! - a single `gloo-timers` timeout is re-armed for the session's nearest
//!   deadline after every input and feeds a `Tick` back through the pump
//!
//! After each input the core event bus is drained and, if anything changed,
//! the `onChange` callback is invoked with a fresh snapshot. The session is
//! never borrowed while JS code runs.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::channel::mpsc;
use futures::stream::{self, Stream, StreamExt};
use gloo_timers::callback::Timeout;
use gloo_utils::format::JsValueSerdeExt;
use wasm_bindgen::prelude::*;

use chat_core::event_bus::EventBus;
use chat_core::ports::{Clock, SocketEvent};
use chat_core::session::{ChatSession, SessionPorts};
use chat_platform::storage::{auto_detect_storage, StorageChangeEvent, StorageListener};
use chat_platform::{BrowserClock, BrowserSocket};
use chat_types::ChatError;

use crate::{resolve_config, to_js_error};

enum Input {
    Socket(SocketEvent),
    Storage(StorageChangeEvent),
    Tick,
}

struct Shared {
    session: RefCell<ChatSession>,
    bus: EventBus,
    clock: BrowserClock,
    timer: RefCell<Option<Timeout>>,
    ticks: mpsc::UnboundedSender<()>,
    on_change: RefCell<Option<js_sys::Function>>,
    storage_listener: RefCell<Option<StorageListener>>,
    disposed: Cell<bool>,
}

impl Shared {
    fn dispatch(&self, input: Input) {
        {
            let mut session = self.session.borrow_mut();
            match input {
                Input::Socket(event) => session.handle_socket_event(event),
                Input::Storage(change) => session
                    .handle_storage_change(change.key.as_deref(), change.new_value.as_deref()),
                Input::Tick => session.tick(),
            }
        }
        self.settle();
    }

    /// Re-arm the timer and notify the host. Call after every input.
    fn settle(&self) {
        if self.disposed.get() {
            return;
        }
        self.reschedule();
        self.notify();
    }

    fn reschedule(&self) {
        let deadline = self.session.borrow().next_deadline();
        // Replacing the previous timeout drops it, which cancels it
        *self.timer.borrow_mut() = deadline.map(|at| {
            let delay = at.saturating_sub(self.clock.now_ms()).min(u32::MAX as u64) as u32;
            let ticks = self.ticks.clone();
            Timeout::new(delay, move || {
                let _ = ticks.unbounded_send(());
            })
        });
    }

    fn notify(&self) {
        let events = self.bus.drain();
        if events.is_empty() {
            return;
        }
        log::debug!("Session changed: {:?}", events);
        let Some(callback) = self.on_change.borrow().clone() else {
            return;
        };
        let snapshot = match self.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Snapshot not serializable: {:?}", e);
                return;
            }
        };
        if let Err(e) = callback.call1(&JsValue::NULL, &snapshot) {
            log::warn!("onChange callback threw: {:?}", e);
        }
    }

    fn snapshot(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.session.borrow().snapshot();
        JsValue::from_serde(&snapshot).map_err(|e| to_js_error(ChatError::from(e)))
    }
}

/// Drive queued inputs into the session until the client goes away.
fn spawn_pump(shared: Weak<Shared>, inputs: impl Stream<Item = Input> + 'static) {
    wasm_bindgen_futures::spawn_local(async move {
        let mut inputs = Box::pin(inputs);
        while let Some(input) = inputs.next().await {
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if shared.disposed.get() {
                break;
            }
            shared.dispatch(input);
        }
        log::debug!("Input pump stopped");
    });
}

#[wasm_bindgen]
pub struct ChatClient {
    shared: Rc<Shared>,
}

impl ChatClient {
    fn with_session(&self, f: impl FnOnce(&mut ChatSession)) {
        if self.shared.disposed.get() {
            log::debug!("Chat client already disposed");
            return;
        }
        f(&mut self.shared.session.borrow_mut());
        self.shared.settle();
    }
}

#[wasm_bindgen]
impl ChatClient {
    /// `init` is the host bootstrap message; `base` optionally carries the
    /// rest of the configuration (at least `wsUrl` in production).
    #[wasm_bindgen(constructor)]
    pub fn new(init: JsValue, base: JsValue) -> Result<ChatClient, JsValue> {
        let config = resolve_config(&init, &base).map_err(to_js_error)?;

        let (socket_tx, socket_rx) = mpsc::unbounded::<SocketEvent>();
        let (storage_tx, storage_rx) = mpsc::unbounded::<StorageChangeEvent>();
        let (tick_tx, tick_rx) = mpsc::unbounded::<()>();

        let ports = SessionPorts {
            storage: auto_detect_storage(),
            socket: Rc::new(BrowserSocket::new(socket_tx)),
            clock: Rc::new(BrowserClock),
        };
        let bus = EventBus::new();
        let mut session = ChatSession::new(config, ports, bus.clone());
        session.mount();

        let storage_listener = match StorageListener::attach(storage_tx) {
            Ok(listener) => Some(listener),
            Err(e) => {
                log::warn!("Cross-tab sync unavailable: {}", e);
                None
            }
        };

        let shared = Rc::new(Shared {
            session: RefCell::new(session),
            bus,
            clock: BrowserClock,
            timer: RefCell::new(None),
            ticks: tick_tx,
            on_change: RefCell::new(None),
            storage_listener: RefCell::new(storage_listener),
            disposed: Cell::new(false),
        });

        let inputs = stream::select(
            socket_rx.map(Input::Socket),
            stream::select(
                storage_rx.map(Input::Storage),
                tick_rx.map(|()| Input::Tick),
            ),
        );
        spawn_pump(Rc::downgrade(&shared), inputs);
        shared.settle();

        log::info!("Chat client ready");
        Ok(ChatClient { shared })
    }

    #[wasm_bindgen(js_name = startChat)]
    pub fn start_chat(&self, name: String, id: String) {
        self.with_session(|s| s.start_chat(&name, &id));
    }

    #[wasm_bindgen(js_name = autoStart)]
    pub fn auto_start(&self) {
        self.with_session(|s| s.auto_start());
    }

    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, content: String, attachment: Option<String>) {
        self.with_session(|s| s.send_message(&content, attachment));
    }

    /// Accepts string or numeric ids; anything else is skipped.
    #[wasm_bindgen(js_name = markMessagesAsRead)]
    pub fn mark_messages_as_read(&self, ids: js_sys::Array) {
        let ids: Vec<String> = ids
            .iter()
            .filter_map(|v| v.as_string().or_else(|| v.as_f64().map(|n| n.to_string())))
            .collect();
        self.with_session(|s| s.mark_messages_as_read(ids));
    }

    #[wasm_bindgen(js_name = endChat)]
    pub fn end_chat(&self) {
        self.with_session(|s| s.end_chat());
    }

    #[wasm_bindgen(js_name = submitRating)]
    pub fn submit_rating(&self, rating: u8) {
        self.with_session(|s| s.submit_rating(rating));
    }

    #[wasm_bindgen(js_name = resetChat)]
    pub fn reset_chat(&self) {
        self.with_session(|s| s.reset_chat());
    }

    #[wasm_bindgen(js_name = updateDraft)]
    pub fn update_draft(&self, text: String) {
        self.with_session(|s| s.update_draft(&text));
    }

    pub fn draft(&self) -> Option<String> {
        self.shared.session.borrow().draft()
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        self.shared.snapshot()
    }

    /// Register the change listener. It is called with a snapshot.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        *self.shared.on_change.borrow_mut() = Some(callback);
    }

    /// Tear down: flush receipts, save the draft, close sockets, stop timers.
    /// Idempotent; every other method becomes a no-op afterwards.
    pub fn dispose(&self) {
        if self.shared.disposed.replace(true) {
            return;
        }
        self.shared.session.borrow_mut().unmount();
        self.shared.timer.borrow_mut().take();
        self.shared.storage_listener.borrow_mut().take();
        self.shared.on_change.borrow_mut().take();
        log::info!("Chat client disposed");
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.dispose();
    }
}
