//! ReadReceiptBatcher: coalesces "message became visible" signals.
//!
//! Ids already flushed are never sent again. A batch goes out once no new id
//! has been observed for the quiet period, or unconditionally on teardown.
//! The server addresses messages numerically, so ids that do not parse as
//! integers are dropped at flush time.

use std::collections::HashSet;

use chat_types::config::TimingConfig;

pub struct ReadReceiptBatcher {
    quiet_ms: u64,
    sent: HashSet<String>,
    pending: Vec<String>,
    flush_at: Option<u64>,
}

impl ReadReceiptBatcher {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            quiet_ms: timing.receipt_quiet_ms,
            sent: HashSet::new(),
            pending: Vec::new(),
            flush_at: None,
        }
    }

    /// Record visible ids. Only ids not yet sent or queued re-arm the timer.
    pub fn observe<I, S>(&mut self, ids: I, now_ms: u64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = false;
        for id in ids {
            let id = id.into();
            if id.is_empty() || self.sent.contains(&id) || self.pending.contains(&id) {
                continue;
            }
            self.pending.push(id);
            added = true;
        }
        if added {
            self.flush_at = Some(now_ms + self.quiet_ms);
        }
    }

    /// The batch to send, once the quiet period has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<Vec<i64>> {
        if self.flush_at.is_some_and(|at| now_ms >= at) {
            self.flush()
        } else {
            None
        }
    }

    /// Take whatever is queued regardless of timing.
    pub fn flush(&mut self) -> Option<Vec<i64>> {
        self.flush_at = None;
        if self.pending.is_empty() {
            return None;
        }
        let mut batch = Vec::with_capacity(self.pending.len());
        for id in self.pending.drain(..) {
            match id.parse::<i64>() {
                Ok(n) => batch.push(n),
                Err(_) => log::debug!("Dropping non-numeric read receipt id {}", id),
            }
            self.sent.insert(id);
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.flush_at
    }

    #[cfg(test)]
    pub(crate) fn was_sent(&self, id: &str) -> bool {
        self.sent.contains(id)
    }

    pub fn reset(&mut self) {
        self.sent.clear();
        self.pending.clear();
        self.flush_at = None;
    }
}
