//! WebSocket adapter over `web_sys::WebSocket`.
//!
//! Each connection gets its own handler closures, tagged with its
//! [`ConnectionId`]. Handlers only push a [`SocketEvent`] into the channel;
//! the session processes it later on the event loop, so a handler never runs
//! while the session is borrowed and can be dropped safely from `close`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use futures::channel::mpsc;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use chat_core::ports::{ConnectionId, SocketEvent, SocketEventKind, SocketPort};
use chat_types::{ChatError, Result};

struct Connection {
    ws: WebSocket,
    _onopen: Closure<dyn FnMut(Event)>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
}

impl Connection {
    /// Unhook every handler so the socket can no longer reach the closures.
    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
    }
}

pub struct BrowserSocket {
    next_id: Cell<u64>,
    connections: RefCell<HashMap<ConnectionId, Connection>>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl BrowserSocket {
    pub fn new(events: mpsc::UnboundedSender<SocketEvent>) -> Self {
        Self {
            next_id: Cell::new(0),
            connections: RefCell::new(HashMap::new()),
            events,
        }
    }

    fn emitter(&self, id: ConnectionId) -> impl Fn(SocketEventKind) + 'static {
        let events = self.events.clone();
        move |kind| {
            if events
                .unbounded_send(SocketEvent {
                    connection: id,
                    kind,
                })
                .is_err()
            {
                log::debug!("Socket event for {:?} after teardown", id);
            }
        }
    }
}

impl SocketPort for BrowserSocket {
    fn connect(&self, url: &str) -> Result<ConnectionId> {
        let ws = WebSocket::new(url)
            .map_err(|e| ChatError::Socket(format!("Failed to open {}: {:?}", url, e)))?;

        let id = ConnectionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let emit = self.emitter(id);
        let onopen = Closure::wrap(Box::new(move |_: Event| {
            emit(SocketEventKind::Opened);
        }) as Box<dyn FnMut(Event)>);

        let emit = self.emitter(id);
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => emit(SocketEventKind::Frame(text)),
                None => log::debug!("Ignoring binary frame"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        let emit = self.emitter(id);
        let onclose = Closure::wrap(Box::new(move |event: CloseEvent| {
            emit(SocketEventKind::Closed {
                code: event.code(),
                reason: event.reason(),
            });
        }) as Box<dyn FnMut(CloseEvent)>);

        let emit = self.emitter(id);
        let onerror = Closure::wrap(Box::new(move |_: Event| {
            emit(SocketEventKind::Error("WebSocket error".to_string()));
        }) as Box<dyn FnMut(Event)>);

        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        self.connections.borrow_mut().insert(
            id,
            Connection {
                ws,
                _onopen: onopen,
                _onmessage: onmessage,
                _onclose: onclose,
                _onerror: onerror,
            },
        );
        log::debug!("WebSocket {:?} -> {}", id, url);
        Ok(id)
    }

    fn send(&self, conn: ConnectionId, text: &str) -> Result<()> {
        let connections = self.connections.borrow();
        let connection = connections
            .get(&conn)
            .ok_or_else(|| ChatError::Socket(format!("Unknown connection {:?}", conn)))?;
        connection
            .ws
            .send_with_str(text)
            .map_err(|e| ChatError::Socket(format!("{:?}", e)))
    }

    fn is_open(&self, conn: ConnectionId) -> bool {
        self.connections
            .borrow()
            .get(&conn)
            .is_some_and(|c| c.ws.ready_state() == WebSocket::OPEN)
    }

    fn close(&self, conn: ConnectionId) {
        let Some(connection) = self.connections.borrow_mut().remove(&conn) else {
            return;
        };
        connection.detach();
        if let Err(e) = connection.ws.close() {
            log::debug!("WebSocket {:?} close failed: {:?}", conn, e);
        }
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        for (_, connection) in self.connections.get_mut().drain() {
            connection.detach();
            let _ = connection.ws.close();
        }
    }
}
