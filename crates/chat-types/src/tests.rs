#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::envelope::*;
    use crate::error::*;
    use crate::i18n::*;
    use crate::message::*;
    use crate::session::*;
    use serde_json::{json, Value};

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_optimistic_message_is_pending() {
        let msg = Message::optimistic("hello", None, 1_700_000_000);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.origin, Origin::Optimistic);
        assert!(msg.is_pending());
        assert!(msg.delivered_at.is_none());
        assert_eq!(msg.sent_at, Some(1_700_000_000));
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_optimistic_ids_are_unique() {
        let a = Message::optimistic("x", None, 1);
        let b = Message::optimistic("x", None, 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_notice_is_local_agent_entry() {
        let msg = Message::notice("Connecting");
        assert!(msg.is_agent());
        assert_eq!(msg.origin, Origin::Local);
        assert!(!msg.is_pending());
    }

    #[test]
    fn test_add_seen_skips_same_timestamp() {
        let mut msg = Message::notice("hi");
        msg.add_seen(10);
        msg.add_seen(10);
        msg.add_seen(11);
        assert_eq!(msg.seen_by.unwrap().len(), 2);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let mut msg = Message::optimistic("hi", Some("data:image/png;base64,AA".into()), 5);
        msg.delivered_at = Some(6);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["origin"], "optimistic");
        assert_eq!(json["deliveredAt"], 6);
        assert_eq!(json["sentAt"], 5);
        assert!(json.get("seenBy").is_none());
    }

    // ─── Outbound Envelope Tests ─────────────────────────────

    #[test]
    fn test_start_envelope_wire_shape() {
        let env = OutboundEnvelope::PlayerStartChatAndJoin {
            player_token: None,
            client_id: "client-1".to_string(),
            player_name: Some("Ada".to_string()),
            player_id: Some(42),
        };
        let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json["tag"], "playerStartChatAndJoin");
        assert_eq!(json["clientId"], "client-1");
        assert_eq!(json["playerName"], "Ada");
        assert_eq!(json["playerId"], 42);
        assert!(json["playerToken"].is_null());
    }

    #[test]
    fn test_rating_envelope_omits_missing_token() {
        let env = OutboundEnvelope::PlayerNewChatRating {
            chat_id: "c1".to_string(),
            client_id: "client".to_string(),
            rating: 5,
            player_token: None,
            player_id: None,
        };
        let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json["tag"], "playerNewChatRating");
        assert_eq!(json["rating"], 5);
        assert!(json.get("playerToken").is_none());
        assert!(json["playerId"].is_null());
    }

    #[test]
    fn test_mark_read_envelope_uses_numeric_ids() {
        let env = OutboundEnvelope::PlayerMarkMessagesAsRead {
            chat_id: "c1".to_string(),
            message_ids: vec![1, 2],
        };
        let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json["tag"], "playerMarkMessagesAsRead");
        assert_eq!(json["messageIds"], json!([1, 2]));
        assert_eq!(env.tag(), "playerMarkMessagesAsRead");
    }

    #[test]
    fn test_send_message_envelope_fields() {
        let env = OutboundEnvelope::PlayerSendMessage {
            player_token: Some("tok".to_string()),
            chat_id: Some("c9".to_string()),
            message: "hello".to_string(),
            attachment: None,
        };
        let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json["tag"], "playerSendMessage");
        assert_eq!(json["playerToken"], "tok");
        assert_eq!(json["chatId"], "c9");
        assert_eq!(json["message"], "hello");
        assert!(json["attachment"].is_null());
    }

    // ─── Inbound Envelope Tests ──────────────────────────────

    fn bump(bump_type: &str, data: Value) -> ServerEvent {
        let frame = json!({ "tag": "bump", "bump_type": bump_type, "bump_data": data });
        match InboundEnvelope::decode(&frame.to_string()).unwrap() {
            InboundEnvelope::Bump(event) => event,
            other => panic!("expected bump, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_start_chat_success() {
        let event = bump("startChatSuccess", json!({ "chat": 77, "full_name": "Ada L." }));
        assert_eq!(
            event,
            ServerEvent::StartChatSuccess {
                chat_id: Some("77".to_string()),
                token: None,
                full_name: Some("Ada L.".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_start_chat_falls_back_to_chat_id_key() {
        let event = bump("startChatSuccess", json!({ "chatId": "abc", "playerToken": "t" }));
        match event {
            ServerEvent::StartChatSuccess { chat_id, token, full_name } => {
                assert_eq!(chat_id.as_deref(), Some("abc"));
                assert_eq!(token.as_deref(), Some("t"));
                assert!(full_name.is_none());
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_message_read_is_seen_alias() {
        let event = bump("messageRead", json!({ "messageId": 5, "seen_by": [{ "seen_at": 100 }] }));
        assert_eq!(
            event,
            ServerEvent::MessageSeen {
                message_id: "5".to_string(),
                seen_by: vec![SeenReceipt { seen_at: 100 }],
            }
        );
    }

    #[test]
    fn test_decode_close_variants() {
        assert_eq!(bump("switchedStatusToClosed", Value::Null), ServerEvent::ChatClosed { by_system: false });
        assert_eq!(bump("chatClosedBySystemAlready", json!({})), ServerEvent::ChatClosed { by_system: true });
    }

    #[test]
    fn test_decode_unknown_bump_type_is_explicit() {
        assert_eq!(
            bump("somethingNew", json!({})),
            ServerEvent::Unrecognized { bump_type: "somethingNew".to_string() }
        );
    }

    #[test]
    fn test_decode_marked_as_read_mixed_ids() {
        let event = bump("messagesMarkedAsRead", json!({ "messageIds": [1, "2", null] }));
        assert_eq!(
            event,
            ServerEvent::MessagesMarkedAsRead { message_ids: vec!["1".to_string(), "2".to_string()] }
        );
    }

    #[test]
    fn test_decode_cooldown() {
        let event = bump("playerOnCooldown", json!({ "seconds_remaining": 30 }));
        assert_eq!(event, ServerEvent::Cooldown { seconds_remaining: Some(30), blocked_until: None });
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = InboundEnvelope::decode("{not json").unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        assert!(InboundEnvelope::decode(r#"{"tag":"pong"}"#).is_err());
        assert!(InboundEnvelope::decode(r#"{"bump_type":"startChatSuccess"}"#).is_err());
    }

    #[test]
    fn test_decode_existing_messages() {
        let frame = json!({
            "tag": "existingMessages",
            "chat_id": 12,
            "messages": [
                { "id": 1, "role": "player", "text": "hi", "timestamp": 100 },
                { "id": 2, "role": "system_event", "text": "joined" },
                { "id": 3, "role": "system_human", "text": "hello", "delivered_at": 101 },
                { "id": 4, "role": "player", "text": "secret", "is_sent_safely": true }
            ]
        });
        match InboundEnvelope::decode(&frame.to_string()).unwrap() {
            InboundEnvelope::ExistingMessages { chat_id, messages } => {
                assert_eq!(chat_id.as_deref(), Some("12"));
                assert_eq!(messages.len(), 4);
                let visible: Vec<Message> = messages.into_iter().filter_map(WireMessage::into_message).collect();
                assert_eq!(visible.len(), 2);
                assert_eq!(visible[0].role, Role::User);
                assert_eq!(visible[0].sent_at, Some(100));
                assert_eq!(visible[1].role, Role::Agent);
                assert_eq!(visible[1].delivered_at, Some(101));
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_wire_message_agent_roles() {
        for role in ["system_human", "system_ai_wasco", "system_ai_vector"] {
            let wire = WireMessage::from_value(&json!({ "role": role, "text": "x" }));
            assert!(wire.is_agent(), "{} should be agent", role);
        }
        let wire = WireMessage::from_value(&json!({ "role": "player", "text": "x" }));
        assert!(!wire.is_agent());
    }

    #[test]
    fn test_wire_message_without_id_gets_one() {
        let msg = WireMessage::from_value(&json!({ "role": "system_human", "text": "x" }))
            .into_message()
            .unwrap();
        assert!(!msg.id.is_empty());
        assert_eq!(msg.origin, Origin::Server);
    }

    #[test]
    fn test_wire_message_string_timestamp() {
        let wire = WireMessage::from_value(&json!({ "timestamp": "1700000000.5" }));
        assert_eq!(wire.timestamp, Some(1_700_000_000));
    }

    // ─── Session Descriptor Tests ────────────────────────────

    fn descriptor(saved_at: i64) -> SessionDescriptor {
        SessionDescriptor {
            chat_id: "c1".to_string(),
            auth_token: None,
            identity_name: Some("Ada".to_string()),
            identity_id: Some(7),
            status: SessionStatus::Active,
            rating_submitted: false,
            saved_at,
        }
    }

    #[test]
    fn test_descriptor_expiry_boundary() {
        let d = descriptor(1_000);
        assert!(!d.is_expired(1_000 + 86_400, 86_400));
        assert!(d.is_expired(1_000 + 86_401, 86_400));
    }

    #[test]
    fn test_descriptor_corrupt_saved_at_is_expired() {
        assert!(descriptor(i64::MIN).is_expired(1_700_000_000, 86_400));
        assert!(descriptor(i64::MAX).is_expired(1_700_000_000, 86_400));
        assert!(descriptor(1_700_000_000 + 86_401).is_expired(1_700_000_000, 86_400));
        assert!(!descriptor(1_700_000_000 + 60).is_expired(1_700_000_000, 86_400));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let json = serde_json::to_value(descriptor(5)).unwrap();
        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["ratingSubmitted"], false);
        assert_eq!(json["savedAtUnix"], 5);
    }

    #[test]
    fn test_descriptor_defaults_optional_fields() {
        let d: SessionDescriptor = serde_json::from_str(r#"{"chatId":"x","savedAtUnix":1}"#).unwrap();
        assert!(d.is_active());
        assert!(!d.rating_submitted);
        assert!(d.auth_token.is_none());
    }

    #[test]
    fn test_descriptor_requires_chat_id() {
        assert!(serde_json::from_str::<SessionDescriptor>(r#"{"savedAtUnix":1}"#).is_err());
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert!(config.endpoint().is_none());
        assert!(config.token().is_none());
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.timing.typing_delay_ms, 1500);
        assert_eq!(config.timing.reveal_quiet_ms, 1000);
        assert_eq!(config.timing.receipt_quiet_ms, 300);
        assert_eq!(config.draft_key(), "support-chat:session:draft");
    }

    #[test]
    fn test_blank_endpoint_is_unconfigured() {
        let config = ChatConfig { ws_url: Some("  ".to_string()), ..ChatConfig::default() };
        assert!(config.endpoint().is_none());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"wsUrl":"wss://chat.example/ws","timing":{"typingDelayMs":10}}"#).unwrap();
        assert_eq!(config.endpoint(), Some("wss://chat.example/ws"));
        assert_eq!(config.timing.typing_delay_ms, 10);
        assert_eq!(config.timing.receipt_quiet_ms, 300);
    }

    #[test]
    fn test_embed_init_into_config() {
        let init: EmbedInit = serde_json::from_value(json!({
            "type": "gamblio-chat-init",
            "clientId": "abc",
            "playerToken": "",
            "language": "me"
        }))
        .unwrap();
        let config = init.into_config(ChatConfig::default()).unwrap();
        assert_eq!(config.client_id, "abc");
        assert!(config.player_token.is_none());
        assert_eq!(config.language, Language::Me);
    }

    #[test]
    fn test_embed_init_rejects_other_types() {
        let init: EmbedInit =
            serde_json::from_value(json!({ "type": "resize", "clientId": "abc" })).unwrap();
        let err = init.into_config(ChatConfig::default()).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    // ─── i18n Tests ──────────────────────────────────────────

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("me"), Language::Me);
        assert_eq!(Language::from_code(" ME "), Language::Me);
        assert_eq!(Language::from_code("de"), Language::En);
    }

    #[test]
    fn test_greeting_with_and_without_name() {
        assert_eq!(
            Language::En.greeting(Some("Ada")),
            "Hi Ada! Thanks for reaching out. How can I help you today?"
        );
        assert_eq!(
            Language::En.greeting(Some("   ")),
            "Hi! Thanks for reaching out. How can I help you today?"
        );
        assert!(Language::Me.greeting(None).starts_with("Zdravo!"));
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_error_display() {
        assert_eq!(ChatError::Storage("quota".into()).to_string(), "Storage error: quota");
        assert_eq!(ChatError::Socket("closed".into()).to_string(), "Socket error: closed");
        assert_eq!(ChatError::Config("x".into()).to_string(), "Configuration error: x");
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<Value>("{{").unwrap_err();
        let err: ChatError = serde_err.into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }
}
