//! WASM-target tests for chat-core.
//!
//! Drives a full ChatSession over the in-memory ports under
//! wasm32-unknown-unknown via `wasm-pack test --node`.

use wasm_bindgen_test::*;

use chat_core::event_bus::{ChatEvent, EventBus};
use chat_core::ports::ConnectionId;
use chat_core::state::{Phase, RatingState};
use chat_core::testing::*;
use chat_types::session::SessionStatus;
use serde_json::json;

// ─── EventBus Tests ──────────────────────────────────────

#[wasm_bindgen_test]
fn event_bus_emit_and_drain() {
    let bus = EventBus::new();
    bus.emit(ChatEvent::TranscriptChanged);
    bus.emit(ChatEvent::PhaseChanged(Phase::Active));

    assert!(bus.has_pending());
    assert_eq!(bus.drain().len(), 2);
    assert!(!bus.has_pending());
}

// ─── Session Tests ───────────────────────────────────────

#[wasm_bindgen_test]
fn session_full_conversation() {
    let mut c = TestClient::new();
    c.start_active("c1");
    c.session.send_message("my deposit is missing", None);
    c.server_bump(
        "newMessage",
        json!({ "id": 10, "role": "player", "text": "my deposit is missing" }),
    );
    c.server_bump(
        "newMessage",
        json!({ "id": 11, "role": "system_ai_wasco", "text": "Let me check." }),
    );
    c.advance(1000);

    let state = c.session.state();
    let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(&ids[1..], &["10", "11"]);

    c.session.end_chat();
    c.session.submit_rating(5);
    assert_eq!(c.session.state().phase, Phase::RatingSubmitted);
    assert_eq!(c.session.snapshot().rating_state, RatingState::Submitted);

    let stored = c.stored().unwrap();
    assert_eq!(stored.status, SessionStatus::Closed);
    assert!(stored.rating_submitted);
}

#[wasm_bindgen_test]
fn session_reload_resumes_over_shared_store() {
    let mut first = TestClient::new();
    first.start_active("c1");
    first.session.unmount();
    assert!(first.socket.was_closed(ConnectionId(0)));

    let mut second = TestClient::with_store(test_config(), first.store.clone());
    second.session.mount();
    second.open_socket();
    second.server_bump("rejoinChatSuccess", json!({ "chatId": "c1" }));

    assert_eq!(second.session.state().phase, Phase::Active);
    assert_eq!(second.sent()[0]["tag"], "playerResumeChat");
    // A resumed chat is never greeted again
    assert!(second.session.state().messages.is_empty());
}

#[wasm_bindgen_test]
fn session_rating_after_reload_uses_one_shot() {
    let mut first = TestClient::new();
    first.start_active("c1");
    first.session.send_message("hello", None);
    first.session.end_chat();
    first.session.unmount();

    let mut second = TestClient::with_store(test_config(), first.store.clone());
    second.session.mount();
    assert_eq!(second.session.state().phase, Phase::ClosedPendingRating);

    second.session.submit_rating(3);
    second.open_socket();
    let sent = second.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["rating"], 3);
    assert!(second.socket.was_closed(ConnectionId(0)));
}

#[wasm_bindgen_test]
fn session_read_receipts_flush_once() {
    let mut c = TestClient::new();
    c.start_active("c1");
    c.session.mark_messages_as_read(["3", "4"]);
    c.session.mark_messages_as_read(["4", "x"]);
    c.advance(300);
    c.advance(300);

    let receipts: Vec<_> = c
        .sent()
        .into_iter()
        .filter(|v| v["tag"] == "playerMarkMessagesAsRead")
        .collect();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["messageIds"], json!([3, 4]));
}
