//! Best-effort persistence of the session descriptor and the composer draft.
//!
//! Nothing here returns an error: a full or unavailable store degrades to a
//! no-op and the failure is only logged.

use std::rc::Rc;

use chat_types::session::SessionDescriptor;

use crate::ports::KeyValueStore;

/// What another tab did to the descriptor key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChange {
    Updated(SessionDescriptor),
    Cleared,
}

pub struct SessionStore {
    kv: Rc<dyn KeyValueStore>,
    key: String,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(kv: Rc<dyn KeyValueStore>, key: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            kv,
            key: key.into(),
            ttl_secs,
        }
    }

    pub fn save(&self, descriptor: &SessionDescriptor) {
        let json = match serde_json::to_string(descriptor) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Session descriptor not serializable: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(&self.key, &json) {
            log::warn!("Session save failed on {}: {}", self.kv.backend_name(), e);
        }
    }

    /// The stored descriptor, unless absent, unreadable or expired.
    /// An expired entry is deleted as a side effect.
    pub fn load(&self, now_secs: i64) -> Option<SessionDescriptor> {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Session load failed on {}: {}", self.kv.backend_name(), e);
                return None;
            }
        };
        let descriptor = parse_descriptor(&raw)?;
        if descriptor.is_expired(now_secs, self.ttl_secs) {
            log::info!("Stored session {} expired, discarding", descriptor.chat_id);
            self.clear();
            return None;
        }
        Some(descriptor)
    }

    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(&self.key) {
            log::warn!("Session clear failed on {}: {}", self.kv.backend_name(), e);
        }
    }

    /// Interpret a storage-change notification from another tab.
    ///
    /// `key == None` means the whole store was wiped. Changes to other keys and
    /// unreadable values yield `None`; an expired descriptor counts as cleared.
    pub fn interpret_change(
        &self,
        key: Option<&str>,
        new_value: Option<&str>,
        now_secs: i64,
    ) -> Option<StorageChange> {
        match key {
            Some(k) if k != self.key => return None,
            None => return Some(StorageChange::Cleared),
            Some(_) => {}
        }
        let Some(raw) = new_value else {
            return Some(StorageChange::Cleared);
        };
        let descriptor = parse_descriptor(raw)?;
        if descriptor.is_expired(now_secs, self.ttl_secs) {
            return Some(StorageChange::Cleared);
        }
        Some(StorageChange::Updated(descriptor))
    }
}

fn parse_descriptor(raw: &str) -> Option<SessionDescriptor> {
    match serde_json::from_str::<SessionDescriptor>(raw) {
        Ok(d) if !d.chat_id.trim().is_empty() => Some(d),
        Ok(_) => {
            log::warn!("Stored session has no chat id, ignoring");
            None
        }
        Err(e) => {
            log::warn!("Stored session unreadable: {}", e);
            None
        }
    }
}

/// Composer text kept across reloads
pub struct DraftStore {
    kv: Rc<dyn KeyValueStore>,
    key: String,
}

impl DraftStore {
    pub fn new(kv: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    pub fn load(&self) -> Option<String> {
        self.kv.get(&self.key).ok().flatten().filter(|d| !d.is_empty())
    }

    pub fn save(&self, text: &str) {
        let result = if text.is_empty() {
            self.kv.remove(&self.key)
        } else {
            self.kv.set(&self.key, text)
        };
        if let Err(e) = result {
            log::warn!("Draft save failed on {}: {}", self.kv.backend_name(), e);
        }
    }

    pub fn clear(&self) {
        self.save("");
    }
}
