//! Cross-tab storage notifications.
//!
//! Browsers fire `storage` on every *other* window of the origin when
//! localStorage changes. The listener forwards each one into a channel; the
//! session consumes them on the next turn of the event loop.

use futures::channel::mpsc;
use wasm_bindgen::prelude::*;
use web_sys::{StorageEvent, Window};

use chat_types::{ChatError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChangeEvent {
    /// `None` when the whole store was cleared
    pub key: Option<String>,
    /// `None` when the key was removed
    pub new_value: Option<String>,
}

/// Detaches itself from the window on drop.
pub struct StorageListener {
    window: Window,
    callback: Closure<dyn FnMut(StorageEvent)>,
}

impl StorageListener {
    pub fn attach(events: mpsc::UnboundedSender<StorageChangeEvent>) -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| ChatError::JsInterop("No window object".to_string()))?;

        let callback = Closure::wrap(Box::new(move |event: StorageEvent| {
            let change = StorageChangeEvent {
                key: event.key(),
                new_value: event.new_value(),
            };
            if events.unbounded_send(change).is_err() {
                log::debug!("Storage event after session teardown");
            }
        }) as Box<dyn FnMut(StorageEvent)>);

        window
            .add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref())
            .map_err(|e| ChatError::JsInterop(format!("{:?}", e)))?;

        Ok(Self { window, callback })
    }
}

impl Drop for StorageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("storage", self.callback.as_ref().unchecked_ref());
    }
}
