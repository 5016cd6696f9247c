use serde::{Deserialize, Serialize};

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// Where a transcript entry came from.
///
/// `Optimistic` entries are the player's own messages that the server has not
/// echoed back yet. `Local` entries are notices produced on this client
/// (greeting, connection and authentication notices) and never carry a
/// server id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Optimistic,
    Server,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenReceipt {
    pub seen_at: i64,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub origin: Origin,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attachment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sent_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delivered_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seen_by: Option<Vec<SeenReceipt>>,
}

impl Message {
    /// The player's own message before the server confirms it.
    pub fn optimistic(
        content: impl Into<String>,
        attachment: Option<String>,
        sent_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            origin: Origin::Optimistic,
            content: content.into(),
            attachment,
            sent_at: Some(sent_at),
            delivered_at: None,
            seen_by: None,
        }
    }

    /// A client-generated agent-side notice.
    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Agent,
            origin: Origin::Local,
            content: content.into(),
            attachment: None,
            sent_at: None,
            delivered_at: None,
            seen_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.origin == Origin::Optimistic && self.delivered_at.is_none()
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }

    /// Record a read receipt unless one with the same timestamp exists.
    pub fn add_seen(&mut self, seen_at: i64) {
        let seen_by = self.seen_by.get_or_insert_with(Vec::new);
        if !seen_by.iter().any(|r| r.seen_at == seen_at) {
            seen_by.push(SeenReceipt { seen_at });
        }
    }
}
