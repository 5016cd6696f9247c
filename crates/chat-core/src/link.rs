//! SocketLink: owns at most one live connection per session.
//!
//! Opening always tears down the previous connection first, and events from
//! any connection other than the live one are discarded, so a replaced socket
//! can never dispatch into the session. Short-lived one-shot connections
//! (rating delivery after a reload) are tracked separately and never dispatch.

use std::rc::Rc;

use chat_types::envelope::{InboundEnvelope, OutboundEnvelope};

use crate::ports::{ConnectionId, SocketEvent, SocketEventKind, SocketPort};

/// What a socket event means for the session
#[derive(Debug, Clone, PartialEq)]
pub enum LinkInput {
    Opened,
    Envelope(InboundEnvelope),
    Closed { code: u16, reason: String },
    Error(String),
    /// Stale connection, one-shot traffic or an undecodable frame
    Ignored,
}

struct LiveConnection {
    id: ConnectionId,
    /// Sent once, as soon as the connection opens
    initial: Option<String>,
}

struct OneShot {
    id: ConnectionId,
    payload: String,
}

pub struct SocketLink {
    port: Rc<dyn SocketPort>,
    live: Option<LiveConnection>,
    one_shots: Vec<OneShot>,
}

impl SocketLink {
    pub fn new(port: Rc<dyn SocketPort>) -> Self {
        Self {
            port,
            live: None,
            one_shots: Vec::new(),
        }
    }

    /// Replace the live connection with a new one that sends `initial` on open.
    pub fn open(&mut self, url: &str, initial: &OutboundEnvelope) -> bool {
        self.close();
        let payload = match initial.encode() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Cannot encode {}: {}", initial.tag(), e);
                return false;
            }
        };
        match self.port.connect(url) {
            Ok(id) => {
                log::info!("Socket {:?} connecting, will send {}", id, initial.tag());
                self.live = Some(LiveConnection {
                    id,
                    initial: Some(payload),
                });
                true
            }
            Err(e) => {
                log::warn!("Socket connect failed: {}", e);
                false
            }
        }
    }

    /// Send over the live connection. False when there is none or it is not open.
    pub fn send(&self, envelope: &OutboundEnvelope) -> bool {
        let Some(live) = self.live.as_ref() else {
            return false;
        };
        if !self.port.is_open(live.id) {
            return false;
        }
        let payload = match envelope.encode() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Cannot encode {}: {}", envelope.tag(), e);
                return false;
            }
        };
        match self.port.send(live.id, &payload) {
            Ok(()) => {
                log::debug!("Sent {} on {:?}", envelope.tag(), live.id);
                true
            }
            Err(e) => {
                log::warn!("Send of {} failed: {}", envelope.tag(), e);
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| self.port.is_open(live.id))
    }

    #[cfg(test)]
    pub(crate) fn has_live(&self) -> bool {
        self.live.is_some()
    }

    /// Close the live connection, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(live) = self.live.take() {
            log::debug!("Closing socket {:?}", live.id);
            self.port.close(live.id);
        }
    }

    /// Open a throwaway connection that delivers `envelope` once and closes.
    pub fn send_one_shot(&mut self, url: &str, envelope: &OutboundEnvelope) -> bool {
        let payload = match envelope.encode() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Cannot encode {}: {}", envelope.tag(), e);
                return false;
            }
        };
        match self.port.connect(url) {
            Ok(id) => {
                log::info!("One-shot socket {:?} for {}", id, envelope.tag());
                self.one_shots.push(OneShot { id, payload });
                true
            }
            Err(e) => {
                log::warn!("One-shot connect failed: {}", e);
                false
            }
        }
    }

    /// Teardown: the live connection and every pending one-shot.
    pub fn close_all(&mut self) {
        self.close();
        for shot in self.one_shots.drain(..) {
            self.port.close(shot.id);
        }
    }

    /// Route one socket event.
    pub fn accept(&mut self, event: SocketEvent) -> LinkInput {
        if self.live.as_ref().is_some_and(|l| l.id == event.connection) {
            return self.accept_live(event.kind);
        }
        if let Some(pos) = self.one_shots.iter().position(|s| s.id == event.connection) {
            self.accept_one_shot(pos, event.kind);
            return LinkInput::Ignored;
        }
        log::debug!("Dropping event from stale socket {:?}", event.connection);
        LinkInput::Ignored
    }

    fn accept_live(&mut self, kind: SocketEventKind) -> LinkInput {
        match kind {
            SocketEventKind::Opened => {
                if let Some(live) = self.live.as_mut() {
                    if let Some(initial) = live.initial.take() {
                        if let Err(e) = self.port.send(live.id, &initial) {
                            log::warn!("Initial envelope not sent: {}", e);
                        }
                    }
                }
                LinkInput::Opened
            }
            SocketEventKind::Frame(text) => {
                log::debug!("Frame: {}", text);
                match InboundEnvelope::decode(&text) {
                    Ok(envelope) => LinkInput::Envelope(envelope),
                    Err(e) => {
                        log::debug!("Dropping frame: {}", e);
                        LinkInput::Ignored
                    }
                }
            }
            SocketEventKind::Closed { code, reason } => {
                log::info!("Socket closed: {} {}", code, reason);
                if let Some(live) = self.live.take() {
                    self.port.close(live.id);
                }
                LinkInput::Closed { code, reason }
            }
            SocketEventKind::Error(message) => {
                log::warn!("Socket error: {}", message);
                LinkInput::Error(message)
            }
        }
    }

    fn accept_one_shot(&mut self, pos: usize, kind: SocketEventKind) {
        match kind {
            SocketEventKind::Opened => {
                let shot = self.one_shots.remove(pos);
                if let Err(e) = self.port.send(shot.id, &shot.payload) {
                    log::warn!("One-shot send failed: {}", e);
                }
                self.port.close(shot.id);
            }
            SocketEventKind::Closed { .. } | SocketEventKind::Error(_) => {
                let shot = self.one_shots.remove(pos);
                log::warn!("One-shot socket {:?} ended before delivery", shot.id);
                self.port.close(shot.id);
            }
            SocketEventKind::Frame(_) => {}
        }
    }
}
