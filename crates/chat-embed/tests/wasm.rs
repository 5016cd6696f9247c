//! WASM-target tests for chat-embed (Node.js runtime).
//!
//! Node has no window, so the client runs on memory storage without
//! cross-tab sync, which is exactly the degraded mode being checked here.

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use chat_embed::{resolve_config, ChatClient};
use chat_types::i18n::Language;
use gloo_utils::format::JsValueSerdeExt;
use serde_json::{json, Value};

fn js(value: Value) -> JsValue {
    JsValue::from_serde(&value).unwrap()
}

fn init() -> JsValue {
    js(json!({ "type": "gamblio-chat-init", "clientId": "casino-7", "language": "me" }))
}

// ─── Config Tests ────────────────────────────────────────

#[wasm_bindgen_test]
fn resolve_config_merges_init_over_base() {
    let base = js(json!({ "wsUrl": "wss://chat.example/ws", "storageKey": "k" }));
    let config = resolve_config(&init(), &base).unwrap();
    assert_eq!(config.client_id, "casino-7");
    assert_eq!(config.language, Language::Me);
    assert_eq!(config.endpoint(), Some("wss://chat.example/ws"));
    assert_eq!(config.storage_key, "k");
}

#[wasm_bindgen_test]
fn resolve_config_without_base_uses_defaults() {
    let config = resolve_config(&init(), &JsValue::UNDEFINED).unwrap();
    assert_eq!(config.endpoint(), None);
    assert_eq!(config.storage_key, "support-chat:session");
}

#[wasm_bindgen_test]
fn resolve_config_rejects_foreign_message() {
    let other = js(json!({ "type": "something-else", "clientId": "x" }));
    assert!(resolve_config(&other, &JsValue::NULL).is_err());
    assert!(resolve_config(&JsValue::from_str("nope"), &JsValue::NULL).is_err());
}

// ─── ChatClient Tests ────────────────────────────────────

#[wasm_bindgen_test]
fn client_starts_in_pre_chat() {
    let client = ChatClient::new(init(), JsValue::UNDEFINED).unwrap();
    let snapshot: Value = client.snapshot().unwrap().into_serde().unwrap();
    assert_eq!(snapshot["phase"], "pre-chat");
    assert_eq!(snapshot["inputEnabled"], false);
    assert_eq!(snapshot["hasToken"], false);
    client.dispose();
}

#[wasm_bindgen_test]
fn client_without_endpoint_shows_notice() {
    let client = ChatClient::new(init(), JsValue::UNDEFINED).unwrap();
    client.start_chat("Ada".to_string(), String::new());

    let snapshot: Value = client.snapshot().unwrap().into_serde().unwrap();
    assert_eq!(snapshot["phase"], "connecting");
    assert_eq!(
        snapshot["messages"][0]["content"],
        Language::Me.backend_not_configured()
    );
    client.dispose();
}

#[wasm_bindgen_test]
fn client_dispose_is_idempotent() {
    let client = ChatClient::new(init(), JsValue::UNDEFINED).unwrap();
    client.dispose();
    client.dispose();
    client.start_chat("Ada".to_string(), String::new());
    let snapshot: Value = client.snapshot().unwrap().into_serde().unwrap();
    assert_eq!(snapshot["phase"], "pre-chat");
}

#[wasm_bindgen_test]
fn client_rejects_bad_init() {
    assert!(ChatClient::new(JsValue::NULL, JsValue::UNDEFINED).is_err());
}
