use serde::{Deserialize, Serialize};

use crate::i18n::Language;
use crate::{ChatError, Result};

const DEFAULT_STORAGE_KEY: &str = "support-chat:session";
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
const EMBED_INIT_TYPE: &str = "gamblio-chat-init";

/// Top-level client configuration, resolved once before the session mounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatConfig {
    /// Backend WebSocket endpoint. `None` or empty means not configured.
    pub ws_url: Option<String>,
    pub client_id: String,
    pub player_token: Option<String>,
    pub language: Language,
    pub storage_key: String,
    pub session_ttl_secs: i64,
    pub timing: TimingConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            client_id: String::new(),
            player_token: None,
            language: Language::En,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            timing: TimingConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn endpoint(&self) -> Option<&str> {
        self.ws_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn token(&self) -> Option<&str> {
        self.player_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn draft_key(&self) -> String {
        format!("{}:draft", self.storage_key)
    }
}

/// Quiet periods and delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingConfig {
    /// After the player sends, show "typing" if no agent reply arrived by then
    pub typing_delay_ms: u64,
    /// Quiet window that coalesces bursts of agent messages into one reveal
    pub reveal_quiet_ms: u64,
    /// Quiet window before visible message ids are flushed as read
    pub receipt_quiet_ms: u64,
    pub draft_quiet_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: 1500,
            reveal_quiet_ms: 1000,
            receipt_quiet_ms: 300,
            draft_quiet_ms: 500,
        }
    }
}

/// Bootstrap message posted by the host page into the embed frame
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedInit {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    #[serde(default)]
    pub player_token: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl EmbedInit {
    /// Merge the host-supplied parameters over a base configuration.
    pub fn into_config(self, base: ChatConfig) -> Result<ChatConfig> {
        if self.kind != EMBED_INIT_TYPE {
            return Err(ChatError::Config(format!(
                "unexpected bootstrap message type: {}",
                self.kind
            )));
        }
        if self.client_id.trim().is_empty() {
            return Err(ChatError::Config("missing clientId".to_string()));
        }
        Ok(ChatConfig {
            client_id: self.client_id,
            player_token: self.player_token.filter(|t| !t.is_empty()),
            language: self
                .language
                .as_deref()
                .map(Language::from_code)
                .unwrap_or_default(),
            ..base
        })
    }
}
