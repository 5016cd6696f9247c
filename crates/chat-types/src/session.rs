use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// The persisted record that lets a reload or a second tab resume a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub chat_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub identity_name: Option<String>,
    #[serde(default)]
    pub identity_id: Option<i64>,
    #[serde(default = "default_status")]
    pub status: SessionStatus,
    #[serde(default)]
    pub rating_submitted: bool,
    /// Unix seconds of the last write
    #[serde(rename = "savedAtUnix")]
    pub saved_at: i64,
}

fn default_status() -> SessionStatus {
    SessionStatus::Active
}

impl SessionDescriptor {
    /// Expired once strictly more than `ttl_secs` have passed since the last save.
    /// A save stamped more than `ttl_secs` in the future is treated as expired too.
    pub fn is_expired(&self, now_secs: i64, ttl_secs: i64) -> bool {
        let age = now_secs.saturating_sub(self.saved_at);
        age > ttl_secs || age < ttl_secs.saturating_neg()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
