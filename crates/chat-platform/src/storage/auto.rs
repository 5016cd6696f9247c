//! Auto-detect the best available storage backend.
//!
//! Priority: localStorage → Memory (fallback)

use std::rc::Rc;

use chat_core::ports::KeyValueStore;

use super::{LocalStorage, MemoryStorage};

/// Open the best available backend. Never fails: without localStorage the
/// chat still works, it just cannot survive a reload.
pub fn auto_detect_storage() -> Rc<dyn KeyValueStore> {
    match LocalStorage::open() {
        Ok(local) => {
            log::info!("Storage backend: localStorage");
            Rc::new(local)
        }
        Err(e) => {
            log::warn!("localStorage unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}
