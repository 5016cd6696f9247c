//! Support chat embed: the WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the browser adapters, hands them to a [`ChatSession`] and
//! exposes the session to the host page as [`ChatClient`].
//!
//! [`ChatSession`]: chat_core::session::ChatSession

mod client;

use gloo_utils::format::JsValueSerdeExt;
use wasm_bindgen::prelude::*;

use chat_types::config::{ChatConfig, EmbedInit};
use chat_types::{ChatError, Result};

pub use client::ChatClient;

/// WASM entry point, run once when the module is instantiated
#[wasm_bindgen(start)]
pub fn start() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Support chat WASM loaded");
}

/// Build the session configuration from the host bootstrap message and an
/// optional base configuration (`wsUrl`, `storageKey`, `timing`, ...).
pub fn resolve_config(init: &JsValue, base: &JsValue) -> Result<ChatConfig> {
    let base: ChatConfig = if base.is_undefined() || base.is_null() {
        ChatConfig::default()
    } else {
        base.into_serde()
            .map_err(|e| ChatError::Config(format!("invalid base config: {}", e)))?
    };
    let init: EmbedInit = init
        .into_serde()
        .map_err(|e| ChatError::Config(format!("invalid init message: {}", e)))?;
    init.into_config(base)
}

pub(crate) fn to_js_error(err: ChatError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}
