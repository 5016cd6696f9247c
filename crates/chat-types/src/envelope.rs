//! Wire protocol: one JSON object per socket frame, discriminated by `tag`.
//!
//! Outbound envelopes are strongly typed and serialized directly. Inbound
//! frames are decoded leniently: the backend mixes numeric and string ids and
//! sends optional fields as `null`, so bump payloads are read field by field
//! from a `serde_json::Value` instead of through strict derives.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, Origin, Role, SeenReceipt};
use crate::{ChatError, Result};

// ─── Outbound ────────────────────────────────────────────────

/// Envelopes sent from the client to the chat backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundEnvelope {
    PlayerStartChatAndJoin {
        player_token: Option<String>,
        client_id: String,
        player_name: Option<String>,
        player_id: Option<i64>,
    },
    PlayerResumeChat {
        chat_id: String,
        player_token: Option<String>,
        client_id: String,
        player_id: Option<i64>,
    },
    PlayerSendMessage {
        player_token: Option<String>,
        chat_id: Option<String>,
        message: String,
        attachment: Option<String>,
    },
    PlayerLeaveChatAndClose {
        player_token: Option<String>,
        chat_id: Option<String>,
        client_id: String,
        player_name: Option<String>,
    },
    PlayerNewChatRating {
        chat_id: String,
        client_id: String,
        rating: u8,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        player_token: Option<String>,
        player_id: Option<i64>,
    },
    PlayerMarkMessagesAsRead {
        chat_id: String,
        message_ids: Vec<i64>,
    },
}

impl OutboundEnvelope {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `tag` value, for logging
    pub fn tag(&self) -> &'static str {
        match self {
            OutboundEnvelope::PlayerStartChatAndJoin { .. } => "playerStartChatAndJoin",
            OutboundEnvelope::PlayerResumeChat { .. } => "playerResumeChat",
            OutboundEnvelope::PlayerSendMessage { .. } => "playerSendMessage",
            OutboundEnvelope::PlayerLeaveChatAndClose { .. } => "playerLeaveChatAndClose",
            OutboundEnvelope::PlayerNewChatRating { .. } => "playerNewChatRating",
            OutboundEnvelope::PlayerMarkMessagesAsRead { .. } => "playerMarkMessagesAsRead",
        }
    }
}

// ─── Inbound ─────────────────────────────────────────────────

/// A decoded server frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Bump(ServerEvent),
    ExistingMessages {
        chat_id: Option<String>,
        messages: Vec<WireMessage>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "tag")]
enum RawEnvelope {
    #[serde(rename = "bump")]
    Bump {
        bump_type: String,
        #[serde(default)]
        bump_data: Value,
    },
    #[serde(rename = "existingMessages")]
    ExistingMessages {
        #[serde(default)]
        chat_id: Value,
        #[serde(default)]
        messages: Vec<Value>,
    },
}

impl InboundEnvelope {
    /// Decode one text frame. Unknown tags and malformed JSON are errors the
    /// caller is expected to log and drop.
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| ChatError::Protocol(format!("undecodable frame: {}", e)))?;
        Ok(match raw {
            RawEnvelope::Bump { bump_type, bump_data } => {
                InboundEnvelope::Bump(ServerEvent::from_bump(&bump_type, &bump_data))
            }
            RawEnvelope::ExistingMessages { chat_id, messages } => {
                InboundEnvelope::ExistingMessages {
                    chat_id: id_string(&chat_id),
                    messages: messages.iter().map(WireMessage::from_value).collect(),
                }
            }
        })
    }
}

/// Server-pushed state-machine events, one variant per known `bump_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    StartChatSuccess {
        chat_id: Option<String>,
        token: Option<String>,
        full_name: Option<String>,
    },
    RejoinChatSuccess {
        chat_id: Option<String>,
        token: Option<String>,
    },
    NewMessage(WireMessage),
    MessageDelivered {
        message_id: String,
        delivered_at: Option<i64>,
    },
    /// `messageSeen` and its alias `messageRead`
    MessageSeen {
        message_id: String,
        seen_by: Vec<SeenReceipt>,
    },
    MessagesMarkedAsRead {
        message_ids: Vec<String>,
    },
    /// `switchedStatusToClosed` (`by_system == false`) or
    /// `chatClosedBySystemAlready` (`by_system == true`)
    ChatClosed {
        by_system: bool,
    },
    ChatRatingSuccess,
    PlayerUnauthenticated {
        is_authenticated: Option<bool>,
    },
    /// Temporary block on the conversation
    Cooldown {
        seconds_remaining: Option<u64>,
        blocked_until: Option<i64>,
    },
    /// A `bump_type` this client does not know about yet
    Unrecognized {
        bump_type: String,
    },
}

impl ServerEvent {
    pub fn from_bump(bump_type: &str, data: &Value) -> Self {
        match bump_type {
            "startChatSuccess" => ServerEvent::StartChatSuccess {
                chat_id: first_id(data, &["chat", "chatId", "chat_id"]),
                token: first_string(data, &["playerToken", "player_token", "token"]),
                full_name: first_string(data, &["full_name"]),
            },
            "rejoinChatSuccess" => ServerEvent::RejoinChatSuccess {
                chat_id: first_id(data, &["chat", "chatId", "chat_id"]),
                token: first_string(data, &["playerToken", "player_token", "token"]),
            },
            "newMessage" => ServerEvent::NewMessage(WireMessage::from_value(data)),
            "messageDelivered" => ServerEvent::MessageDelivered {
                message_id: first_id(data, &["messageId"]).unwrap_or_default(),
                delivered_at: data.get("delivered_at").and_then(as_unix),
            },
            "messageSeen" | "messageRead" => ServerEvent::MessageSeen {
                message_id: first_id(data, &["messageId"]).unwrap_or_default(),
                seen_by: seen_receipts(data.get("seen_by")).unwrap_or_default(),
            },
            "messagesMarkedAsRead" => ServerEvent::MessagesMarkedAsRead {
                message_ids: data
                    .get("messageIds")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(id_string).collect())
                    .unwrap_or_default(),
            },
            "switchedStatusToClosed" => ServerEvent::ChatClosed { by_system: false },
            "chatClosedBySystemAlready" => ServerEvent::ChatClosed { by_system: true },
            "chatRatingSuccess" => ServerEvent::ChatRatingSuccess,
            "playerUnauthenticated" => ServerEvent::PlayerUnauthenticated {
                is_authenticated: data.get("is_authenticated").and_then(Value::as_bool),
            },
            "playerOnCooldown" => ServerEvent::Cooldown {
                seconds_remaining: data.get("seconds_remaining").and_then(Value::as_u64),
                blocked_until: data.get("blocked_until").and_then(as_unix),
            },
            other => ServerEvent::Unrecognized {
                bump_type: other.to_string(),
            },
        }
    }
}

/// A message as the backend sends it, in `newMessage` bumps and in history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireMessage {
    pub id: Option<String>,
    pub role: String,
    pub text: String,
    pub attachment_url: Option<String>,
    pub timestamp: Option<i64>,
    pub delivered_at: Option<i64>,
    pub seen_by: Option<Vec<SeenReceipt>>,
    pub is_sent_safely: bool,
}

const AGENT_ROLES: &[&str] = &["system_human", "system_ai_wasco", "system_ai_vector"];
const HIDDEN_ROLES: &[&str] = &["system_event", "system_chat_rating"];

impl WireMessage {
    pub fn from_value(data: &Value) -> Self {
        Self {
            id: first_id(data, &["id", "messageId"]),
            role: first_string(data, &["role"]).unwrap_or_default(),
            text: first_string(data, &["text"]).unwrap_or_default(),
            attachment_url: first_string(data, &["attachment_url"]),
            timestamp: data.get("timestamp").and_then(as_unix),
            delivered_at: data.get("delivered_at").and_then(as_unix),
            seen_by: seen_receipts(data.get("seen_by")),
            is_sent_safely: data.get("is_sent_safely").and_then(Value::as_bool) == Some(true),
        }
    }

    pub fn is_agent(&self) -> bool {
        AGENT_ROLES.contains(&self.role.as_str())
    }

    /// Event markers, rating records and safely-sent entries never reach the transcript.
    pub fn is_visible(&self) -> bool {
        !self.is_sent_safely && !HIDDEN_ROLES.contains(&self.role.as_str())
    }

    /// Convert into a transcript entry, or `None` when the message is hidden.
    pub fn into_message(self) -> Option<Message> {
        if !self.is_visible() {
            return None;
        }
        let role = if self.is_agent() { Role::Agent } else { Role::User };
        Some(Message {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role,
            origin: Origin::Server,
            content: self.text,
            attachment: self.attachment_url,
            sent_at: self.timestamp,
            delivered_at: self.delivered_at,
            seen_by: self.seen_by,
        })
    }
}

// ─── Lenient field helpers ───────────────────────────────────

/// Ids arrive as strings or numbers; both normalize to a string.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_id(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| data.get(*k).and_then(id_string))
}

fn first_string(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match data.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn as_unix(value: &Value) -> Option<i64> {
    let ts = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    ts.filter(|ts| *ts > 0)
}

fn seen_receipts(value: Option<&Value>) -> Option<Vec<SeenReceipt>> {
    let entries = value?.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|e| e.get("seen_at").and_then(as_unix))
            .map(|seen_at| SeenReceipt { seen_at })
            .collect(),
    )
}
