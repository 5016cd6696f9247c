//! Simple event bus for decoupled communication between the session and the host UI.
//!
//! The bus is single-threaded (WASM constraint) and uses interior mutability
//! via RefCell. Events are buffered and drained by the embed layer after
//! every input it pumps into the session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::state::{Phase, RatingState};

/// Change notifications emitted by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    PhaseChanged(Phase),
    TranscriptChanged,
    InputChanged(bool),
    TypingChanged(bool),
    BumpChanged(bool),
    RatingChanged(RatingState),
}

/// Shared event bus, clone-cheap via Rc.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<VecDeque<ChatEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn emit(&self, event: ChatEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    pub fn drain(&self) -> Vec<ChatEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
