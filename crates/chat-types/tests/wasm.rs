//! WASM-target tests for chat-types.
//!
//! Mirrors the native unit tests but runs under wasm32-unknown-unknown
//! via `wasm-pack test --node`.

use wasm_bindgen_test::*;

use chat_types::config::*;
use chat_types::envelope::*;
use chat_types::i18n::*;
use chat_types::message::*;
use chat_types::session::*;
use serde_json::{json, Value};

// ─── Envelope Tests ──────────────────────────────────────

#[wasm_bindgen_test]
fn start_envelope_encodes_tag() {
    let env = OutboundEnvelope::PlayerStartChatAndJoin {
        player_token: Some("pt".to_string()),
        client_id: "client-1".to_string(),
        player_name: None,
        player_id: None,
    };
    let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
    assert_eq!(json["tag"], "playerStartChatAndJoin");
    assert_eq!(json["playerToken"], "pt");
    assert_eq!(json["clientId"], "client-1");
}

#[wasm_bindgen_test]
fn decode_new_message_bump() {
    let frame = json!({
        "tag": "bump",
        "bump_type": "newMessage",
        "bump_data": { "id": 9, "text": "hello", "role": "system_human" }
    });
    match InboundEnvelope::decode(&frame.to_string()).unwrap() {
        InboundEnvelope::Bump(ServerEvent::NewMessage(wire)) => {
            assert_eq!(wire.id.as_deref(), Some("9"));
            assert_eq!(wire.text, "hello");
            assert!(wire.is_agent());
        }
        other => panic!("Wrong envelope: {:?}", other),
    }
}

#[wasm_bindgen_test]
fn decode_history_frame() {
    let frame = json!({ "tag": "existingMessages", "chat_id": 77, "messages": [] });
    match InboundEnvelope::decode(&frame.to_string()).unwrap() {
        InboundEnvelope::ExistingMessages { chat_id, messages } => {
            assert_eq!(chat_id.as_deref(), Some("77"));
            assert!(messages.is_empty());
        }
        other => panic!("Wrong envelope: {:?}", other),
    }
}

#[wasm_bindgen_test]
fn decode_extreme_cooldown_values() {
    let frame = json!({
        "tag": "bump",
        "bump_type": "playerOnCooldown",
        "bump_data": { "blocked_until": "1e30" }
    });
    match InboundEnvelope::decode(&frame.to_string()).unwrap() {
        InboundEnvelope::Bump(ServerEvent::Cooldown { blocked_until, .. }) => {
            assert_eq!(blocked_until, Some(i64::MAX));
        }
        other => panic!("Wrong envelope: {:?}", other),
    }
}

#[wasm_bindgen_test]
fn decode_rejects_unknown_tag() {
    assert!(InboundEnvelope::decode(r#"{"tag":"mystery"}"#).is_err());
}

// ─── Descriptor Tests ────────────────────────────────────

#[wasm_bindgen_test]
fn descriptor_roundtrip() {
    let d = SessionDescriptor {
        chat_id: "c1".to_string(),
        auth_token: Some("tok".to_string()),
        identity_name: None,
        identity_id: Some(3),
        status: SessionStatus::Closed,
        rating_submitted: true,
        saved_at: 1_700_000_000,
    };
    let json = serde_json::to_string(&d).unwrap();
    assert!(json.contains("\"savedAtUnix\":1700000000"));
    let back: SessionDescriptor = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
}

#[wasm_bindgen_test]
fn descriptor_corrupt_timestamp_is_expired() {
    let d: SessionDescriptor =
        serde_json::from_value(json!({ "chatId": "c1", "savedAtUnix": i64::MIN })).unwrap();
    assert!(d.is_expired(1_700_000_000, 86_400));
}

// ─── Message and Config Tests ────────────────────────────

#[wasm_bindgen_test]
fn optimistic_message_is_pending() {
    let msg = Message::optimistic("hi", None, 1);
    assert!(msg.is_pending());
    assert_eq!(msg.role, Role::User);
}

#[wasm_bindgen_test]
fn default_config_language() {
    let config = ChatConfig::default();
    assert_eq!(config.language, Language::En);
    assert_eq!(Language::from_code("ME"), Language::Me);
}
