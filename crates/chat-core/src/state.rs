//! The single source of truth for what the host UI shows.

use serde::Serialize;

use chat_types::message::{Message, Role};
use chat_types::session::{SessionDescriptor, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreChat,
    Connecting,
    Active,
    ClosedPendingRating,
    RatingSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingState {
    None,
    Pending,
    Submitted,
}

/// A transient server-imposed block on the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBump {
    pub expires_at_ms: u64,
}

impl ActiveBump {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Whole seconds left, rounded up
    pub fn seconds_remaining(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    pub phase: Phase,
    pub messages: Vec<Message>,
    pub is_typing: bool,
    pub active_bump: Option<ActiveBump>,
    pub chat_id: Option<String>,
    pub auth_token: Option<String>,
    pub identity: Identity,
    /// The live connection is open and the backend accepted the player.
    /// Cleared by transport failures and authentication rejections.
    pub link_ready: bool,
    pub greeted: bool,
    /// At least one player message exists in this session
    pub user_message_sent: bool,
    /// A resume envelope is in flight and not yet confirmed
    pub resuming: bool,
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            phase: Phase::PreChat,
            messages: Vec::new(),
            is_typing: false,
            active_bump: None,
            chat_id: None,
            auth_token: None,
            identity: Identity::default(),
            link_ready: false,
            greeted: false,
            user_message_sent: false,
            resuming: false,
        }
    }

    /// Input is accepted only in an active chat with a usable link and no block.
    pub fn input_enabled(&self) -> bool {
        self.phase == Phase::Active && self.active_bump.is_none() && self.link_ready
    }

    pub fn rating_state(&self) -> RatingState {
        match self.phase {
            Phase::ClosedPendingRating => RatingState::Pending,
            Phase::RatingSubmitted => RatingState::Submitted,
            _ => RatingState::None,
        }
    }

    pub fn has_user_messages(&self) -> bool {
        self.user_message_sent || self.messages.iter().any(|m| m.role == Role::User)
    }

    /// The descriptor this state would persist, if a chat id is known.
    pub fn descriptor(
        &self,
        status: SessionStatus,
        rating_submitted: bool,
        saved_at: i64,
    ) -> Option<SessionDescriptor> {
        let chat_id = self.chat_id.clone()?;
        Some(SessionDescriptor {
            chat_id,
            auth_token: self.auth_token.clone(),
            identity_name: self.identity.name.clone(),
            identity_id: self.identity.id,
            status,
            rating_submitted,
            saved_at,
        })
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialisable projection handed to the host UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub phase: Phase,
    pub messages: Vec<Message>,
    pub input_enabled: bool,
    pub is_typing: bool,
    pub bump_seconds_remaining: Option<u64>,
    pub rating_state: RatingState,
    pub has_token: bool,
}
