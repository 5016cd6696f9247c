//! `window.localStorage` backend.
//! Shared by every tab on the origin; other tabs learn about writes through
//! the window `storage` event (see [`super::events`]).

use web_sys::Storage;

use chat_core::ports::KeyValueStore;
use chat_types::{ChatError, Result};

const PROBE_KEY: &str = "__support_chat_probe__";

pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// Open localStorage and verify that it accepts writes.
    pub fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| ChatError::Storage("No window object".to_string()))?;

        let storage = window
            .local_storage()
            .map_err(|e| ChatError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| ChatError::Storage("localStorage not available".to_string()))?;

        // Private browsing modes expose the object but throw on write
        storage
            .set_item(PROBE_KEY, "1")
            .map_err(|e| ChatError::Storage(format!("localStorage is read-only: {:?}", e)))?;
        let _ = storage.remove_item(PROBE_KEY);

        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| ChatError::Storage(format!("{:?}", e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| ChatError::Storage(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| ChatError::Storage(format!("{:?}", e)))
    }

    fn backend_name(&self) -> &str {
        "localStorage"
    }
}
