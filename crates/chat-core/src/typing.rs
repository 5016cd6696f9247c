//! TypingCoordinator: the "agent is typing" indicator and burst coalescing.
//!
//! Two independent deadlines:
//! - expectation: armed when the player sends; shows the indicator unless an
//!   agent message arrives first
//! - reveal: re-armed by every agent message; when it passes with no further
//!   arrivals the queued messages are released together and the indicator clears

use chat_types::config::TimingConfig;
use chat_types::message::Message;

#[derive(Debug, Default, PartialEq)]
pub struct TypingTick {
    /// Agent messages to append to the transcript, in arrival order
    pub revealed: Vec<Message>,
    pub typing_changed: bool,
}

pub struct TypingCoordinator {
    typing_delay_ms: u64,
    reveal_quiet_ms: u64,
    expect_at: Option<u64>,
    reveal_at: Option<u64>,
    pending: Vec<Message>,
    visible: bool,
}

impl TypingCoordinator {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            typing_delay_ms: timing.typing_delay_ms,
            reveal_quiet_ms: timing.reveal_quiet_ms,
            expect_at: None,
            reveal_at: None,
            pending: Vec::new(),
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn player_sent(&mut self, now_ms: u64) {
        if !self.visible {
            self.expect_at = Some(now_ms + self.typing_delay_ms);
        }
    }

    /// Queue an agent message behind the indicator. Returns whether the
    /// indicator switched on.
    pub fn agent_arrived(&mut self, message: Message, now_ms: u64) -> bool {
        self.expect_at = None;
        self.pending.push(message);
        self.reveal_at = Some(now_ms + self.reveal_quiet_ms);
        let changed = !self.visible;
        self.visible = true;
        changed
    }

    pub fn poll(&mut self, now_ms: u64) -> TypingTick {
        let mut tick = TypingTick::default();
        if self.expect_at.is_some_and(|at| now_ms >= at) {
            self.expect_at = None;
            if !self.visible {
                self.visible = true;
                tick.typing_changed = true;
            }
        }
        if self.reveal_at.is_some_and(|at| now_ms >= at) {
            self.reveal_at = None;
            tick.revealed = std::mem::take(&mut self.pending);
            if self.visible {
                self.visible = false;
                tick.typing_changed = true;
            }
        }
        tick
    }

    pub fn next_deadline(&self) -> Option<u64> {
        match (self.expect_at, self.reveal_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Release everything queued immediately and stop both timers.
    pub fn flush_now(&mut self) -> Vec<Message> {
        self.expect_at = None;
        self.reveal_at = None;
        self.visible = false;
        std::mem::take(&mut self.pending)
    }

    pub fn reset(&mut self) {
        self.flush_now();
    }
}
