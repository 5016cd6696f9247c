//! ChatSession: the orchestrator and the only mutation path for chat state.
//!
//! The session owns every mutable field (socket handle, ids, flags, timers)
//! and is driven by four kinds of input, all on the single event loop:
//! public operations from the host UI, [`SocketEvent`]s, storage-change
//! notifications from other tabs, and [`ChatSession::tick`] when the nearest
//! deadline reported by [`ChatSession::next_deadline`] has passed.
//!
//! No operation returns an error. Failures become state, or are logged.

use std::rc::Rc;

use chat_types::config::ChatConfig;
use chat_types::envelope::{InboundEnvelope, OutboundEnvelope};
use chat_types::message::Message;
use chat_types::session::{SessionDescriptor, SessionStatus};

use crate::event_bus::{ChatEvent, EventBus};
use crate::link::{LinkInput, SocketLink};
use crate::ports::{Clock, KeyValueStore, SocketEvent, SocketPort};
use crate::receipts::ReadReceiptBatcher;
use crate::reconciler;
use crate::reducer::{self, Effect, ReduceContext};
use crate::state::{ActiveBump, ChatSnapshot, ChatState, Identity, Phase, RatingState};
use crate::store::{DraftStore, SessionStore, StorageChange};
use crate::typing::TypingCoordinator;

/// Platform adapters the session runs on
#[derive(Clone)]
pub struct SessionPorts {
    pub storage: Rc<dyn KeyValueStore>,
    pub socket: Rc<dyn SocketPort>,
    pub clock: Rc<dyn Clock>,
}

/// The UI-relevant slice of state, compared before and after each input
#[derive(PartialEq)]
struct Observed {
    phase: Phase,
    input_enabled: bool,
    is_typing: bool,
    bump: Option<ActiveBump>,
    rating: RatingState,
}

struct PendingDraft {
    text: String,
    save_at: u64,
}

pub struct ChatSession {
    config: ChatConfig,
    store: SessionStore,
    drafts: DraftStore,
    link: SocketLink,
    clock: Rc<dyn Clock>,
    bus: EventBus,
    state: ChatState,
    typing: TypingCoordinator,
    receipts: ReadReceiptBatcher,
    pending_draft: Option<PendingDraft>,
    auto_started: bool,
    mounted: bool,
}

impl ChatSession {
    pub fn new(config: ChatConfig, ports: SessionPorts, bus: EventBus) -> Self {
        Self {
            store: SessionStore::new(
                ports.storage.clone(),
                config.storage_key.clone(),
                config.session_ttl_secs,
            ),
            drafts: DraftStore::new(ports.storage, config.draft_key()),
            link: SocketLink::new(ports.socket),
            clock: ports.clock,
            bus,
            state: ChatState::new(),
            typing: TypingCoordinator::new(&config.timing),
            receipts: ReadReceiptBatcher::new(&config.timing),
            pending_draft: None,
            auto_started: false,
            mounted: false,
            config,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn has_token(&self) -> bool {
        self.config.token().is_some()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let now = self.clock.now_ms();
        ChatSnapshot {
            phase: self.state.phase,
            messages: self.state.messages.clone(),
            input_enabled: self.state.input_enabled(),
            is_typing: self.state.is_typing,
            bump_seconds_remaining: self.state.active_bump.map(|b| b.seconds_remaining(now)),
            rating_state: self.state.rating_state(),
            has_token: self.has_token(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────

    /// Restore a persisted session, if a valid one exists. Runs once.
    ///
    /// State is set synchronously from the descriptor so the host never
    /// renders the pre-chat screen for a chat that is about to resume.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        match self.store.load(self.clock.now_secs()) {
            Some(descriptor) => {
                log::info!("Restoring chat {} ({:?})", descriptor.chat_id, descriptor.status);
                let before = self.observe();
                self.restore(descriptor);
                self.publish(before);
            }
            None => log::debug!("No stored session to restore"),
        }
    }

    /// Teardown: flush read receipts and the draft, stop timers, close every socket.
    pub fn unmount(&mut self) {
        self.flush_receipts();
        if let Some(draft) = self.pending_draft.take() {
            self.drafts.save(&draft.text);
        }
        self.typing.reset();
        self.state.is_typing = false;
        self.link.close_all();
        self.mounted = false;
    }

    // ─── Public operations ───────────────────────────────────

    pub fn start_chat(&mut self, identity_name: &str, identity_ref: &str) {
        if self.state.phase != Phase::PreChat {
            log::warn!("start_chat in phase {:?}, ignoring", self.state.phase);
            return;
        }
        let before = self.observe();
        let name = Some(identity_name.trim().to_string()).filter(|n| !n.is_empty());
        self.state.identity = Identity {
            name: name.clone(),
            id: identity_ref.trim().parse::<i64>().ok(),
        };
        self.begin_connecting();

        match self.config.endpoint().map(str::to_string) {
            Some(url) => {
                let envelope = OutboundEnvelope::PlayerStartChatAndJoin {
                    player_token: None,
                    client_id: self.config.client_id.clone(),
                    player_name: name,
                    player_id: self.state.identity.id,
                };
                if !self.link.open(&url, &envelope) {
                    self.push_notice(self.config.language.could_not_connect());
                }
            }
            None => {
                log::warn!("No chat endpoint configured");
                self.push_notice(self.config.language.backend_not_configured());
            }
        }
        self.publish(before);
    }

    /// Start with the host-supplied player token. Runs at most once per chat.
    pub fn auto_start(&mut self) {
        if self.auto_started || self.state.phase != Phase::PreChat {
            return;
        }
        let (Some(token), Some(url)) = (
            self.config.token().map(str::to_string),
            self.config.endpoint().map(str::to_string),
        ) else {
            return;
        };
        let before = self.observe();
        self.auto_started = true;
        self.state.identity = Identity::default();
        self.begin_connecting();
        self.state.auth_token = Some(token.clone());
        let envelope = OutboundEnvelope::PlayerStartChatAndJoin {
            player_token: Some(token),
            client_id: self.config.client_id.clone(),
            player_name: None,
            player_id: None,
        };
        if !self.link.open(&url, &envelope) {
            self.push_notice(self.config.language.could_not_connect());
        }
        self.publish(before);
    }

    pub fn send_message(&mut self, content: &str, attachment: Option<String>) {
        if !self.state.input_enabled() {
            log::debug!("send_message while input disabled, ignoring");
            return;
        }
        if content.trim().is_empty() && attachment.is_none() {
            return;
        }
        let before = self.observe();
        let now = self.clock.now_ms();
        self.state.messages.push(Message::optimistic(
            content,
            attachment.clone(),
            (now / 1000) as i64,
        ));
        self.state.user_message_sent = true;
        self.bus.emit(ChatEvent::TranscriptChanged);
        self.typing.player_sent(now);
        self.pending_draft = None;
        self.drafts.clear();

        let envelope = OutboundEnvelope::PlayerSendMessage {
            player_token: self.state.auth_token.clone(),
            chat_id: self.state.chat_id.clone(),
            message: content.to_string(),
            attachment,
        };
        if !self.link.send(&envelope) {
            self.push_notice(self.config.language.connection_unavailable());
        }
        self.publish(before);
    }

    pub fn mark_messages_as_read<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receipts.observe(ids, self.clock.now_ms());
    }

    pub fn end_chat(&mut self) {
        if !matches!(self.state.phase, Phase::Connecting | Phase::Active) {
            return;
        }
        let before = self.observe();
        let envelope = OutboundEnvelope::PlayerLeaveChatAndClose {
            player_token: self.state.auth_token.clone(),
            chat_id: self.state.chat_id.clone(),
            client_id: self.config.client_id.clone(),
            player_name: self.state.identity.name.clone(),
        };
        if !self.link.send(&envelope) {
            log::info!("Leave request not delivered, closing locally");
        }
        let effects = reducer::close_chat(&mut self.state);
        self.run_effects(effects);
        self.publish(before);
    }

    /// Rate the closed chat. Falls back to a one-shot socket when the live one
    /// is gone, so a rating survives a reload after the chat closed.
    pub fn submit_rating(&mut self, value: u8) {
        if !(1..=5).contains(&value) {
            log::warn!("Rating {} out of range, ignoring", value);
            return;
        }
        if self.state.phase != Phase::ClosedPendingRating {
            log::warn!("submit_rating in phase {:?}, ignoring", self.state.phase);
            return;
        }
        let Some(chat_id) = self.state.chat_id.clone() else {
            log::warn!("submit_rating without a chat id, ignoring");
            return;
        };
        let before = self.observe();
        let envelope = OutboundEnvelope::PlayerNewChatRating {
            chat_id,
            client_id: self.config.client_id.clone(),
            rating: value,
            player_token: self.state.auth_token.clone(),
            player_id: self.state.identity.id,
        };
        if !self.link.send(&envelope) {
            match self.config.endpoint().map(str::to_string) {
                Some(url) => {
                    if !self.link.send_one_shot(&url, &envelope) {
                        log::warn!("Rating not delivered: one-shot connect failed");
                    }
                }
                None => log::warn!("Rating not delivered: no endpoint configured"),
            }
        }
        self.state.phase = Phase::RatingSubmitted;
        self.persist(SessionStatus::Closed, true);
        self.publish(before);
    }

    /// Forget everything and return to pre-chat.
    pub fn reset_chat(&mut self) {
        let before = self.observe();
        self.flush_receipts();
        self.discard();
        self.publish(before);
    }

    pub fn update_draft(&mut self, text: &str) {
        if !self.has_token() {
            return;
        }
        self.pending_draft = Some(PendingDraft {
            text: text.to_string(),
            save_at: self.clock.now_ms() + self.config.timing.draft_quiet_ms,
        });
    }

    pub fn draft(&self) -> Option<String> {
        if !self.has_token() {
            return None;
        }
        match self.pending_draft.as_ref() {
            Some(pending) => Some(pending.text.clone()).filter(|t| !t.is_empty()),
            None => self.drafts.load(),
        }
    }

    // ─── Inputs from the platform ────────────────────────────

    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        let before = self.observe();
        match self.link.accept(event) {
            LinkInput::Opened | LinkInput::Ignored => {}
            LinkInput::Envelope(envelope) => self.apply(envelope),
            LinkInput::Closed { .. } => self.transport_lost(true),
            LinkInput::Error(_) => self.transport_lost(false),
        }
        self.publish(before);
    }

    /// A storage-change notification from another tab.
    pub fn handle_storage_change(&mut self, key: Option<&str>, new_value: Option<&str>) {
        let Some(change) = self
            .store
            .interpret_change(key, new_value, self.clock.now_secs())
        else {
            return;
        };
        let before = self.observe();
        match change {
            StorageChange::Cleared => {
                if matches!(
                    self.state.phase,
                    Phase::ClosedPendingRating | Phase::RatingSubmitted
                ) {
                    log::info!("Session cleared in another tab");
                    self.link.close();
                    self.reset_local();
                }
            }
            StorageChange::Updated(descriptor) => {
                if self.state.chat_id.as_deref() == Some(descriptor.chat_id.as_str()) {
                    self.merge_from_other_tab(descriptor);
                } else if self.state.phase == Phase::Connecting && self.state.chat_id.is_none() {
                    log::debug!("Ignoring foreign session while starting a chat");
                } else {
                    log::info!("Switching to chat {} from another tab", descriptor.chat_id);
                    self.link.close();
                    self.reset_local();
                    self.restore(descriptor);
                }
            }
        }
        self.publish(before);
    }

    /// Fire every deadline that has passed.
    pub fn tick(&mut self) {
        let before = self.observe();
        let now = self.clock.now_ms();

        let typing = self.typing.poll(now);
        if typing.typing_changed {
            log::debug!("Typing indicator visible: {}", self.typing.is_visible());
        }
        self.reveal(typing.revealed);

        if let Some(batch) = self.receipts.poll(now) {
            self.send_receipts(batch);
        }
        if self.state.active_bump.is_some_and(|b| b.is_expired(now)) {
            self.state.active_bump = None;
        }
        if self.pending_draft.as_ref().is_some_and(|d| now >= d.save_at) {
            if let Some(draft) = self.pending_draft.take() {
                self.drafts.save(&draft.text);
            }
        }
        self.publish(before);
    }

    /// The earliest pending deadline, in clock milliseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.typing.next_deadline(),
            self.receipts.next_deadline(),
            self.state.active_bump.map(|b| b.expires_at_ms),
            self.pending_draft.as_ref().map(|d| d.save_at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ─── Internals ───────────────────────────────────────────

    fn begin_connecting(&mut self) {
        self.state.phase = Phase::Connecting;
        self.state.link_ready = false;
        self.state.resuming = false;
        self.state.greeted = false;
    }

    fn apply(&mut self, envelope: InboundEnvelope) {
        let ctx = ReduceContext {
            language: self.config.language,
            now_ms: self.clock.now_ms(),
        };
        let effects = reducer::reduce(&mut self.state, envelope, &ctx);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::TranscriptChanged => self.bus.emit(ChatEvent::TranscriptChanged),
                Effect::Persist {
                    status,
                    rating_submitted,
                } => self.persist(status, rating_submitted),
                Effect::Discard => self.discard(),
                Effect::QueueAgentMessage(message) => {
                    self.typing.agent_arrived(message, self.clock.now_ms());
                }
                Effect::StopTyping => {
                    let queued = self.typing.flush_now();
                    self.reveal(queued);
                }
            }
        }
    }

    fn transport_lost(&mut self, closed: bool) {
        if closed && self.state.resuming {
            log::info!("Resume socket closed before confirmation, discarding stale session");
            self.discard();
            return;
        }
        self.state.link_ready = false;
    }

    fn restore(&mut self, descriptor: SessionDescriptor) {
        self.state.chat_id = Some(descriptor.chat_id.clone());
        self.state.auth_token = descriptor.auth_token.clone();
        self.state.identity = Identity {
            name: descriptor.identity_name.clone(),
            id: descriptor.identity_id,
        };
        self.state.greeted = true;
        match (descriptor.status, descriptor.rating_submitted) {
            (SessionStatus::Active, _) => {
                self.state.phase = Phase::Connecting;
                self.state.resuming = true;
                self.open_resume(&descriptor);
            }
            (SessionStatus::Closed, rated) => {
                self.state.user_message_sent = true;
                self.state.phase = if rated {
                    Phase::RatingSubmitted
                } else {
                    Phase::ClosedPendingRating
                };
            }
        }
    }

    fn open_resume(&mut self, descriptor: &SessionDescriptor) {
        let Some(url) = self.config.endpoint().map(str::to_string) else {
            log::warn!("Cannot resume without an endpoint");
            self.discard();
            return;
        };
        let envelope = OutboundEnvelope::PlayerResumeChat {
            chat_id: descriptor.chat_id.clone(),
            player_token: descriptor
                .auth_token
                .clone()
                .or_else(|| self.config.token().map(str::to_string)),
            client_id: self.config.client_id.clone(),
            player_id: descriptor.identity_id,
        };
        if !self.link.open(&url, &envelope) {
            self.discard();
        }
    }

    fn merge_from_other_tab(&mut self, descriptor: SessionDescriptor) {
        if descriptor.auth_token.is_some() {
            self.state.auth_token = descriptor.auth_token.clone();
        }
        if descriptor.is_active() {
            return;
        }
        match self.state.phase {
            Phase::Connecting | Phase::Active | Phase::ClosedPendingRating => {
                log::info!("Chat {} closed in another tab", descriptor.chat_id);
                self.state.resuming = false;
                self.state.user_message_sent = true;
                let queued = self.typing.flush_now();
                self.reveal(queued);
                self.state.phase = if descriptor.rating_submitted {
                    Phase::RatingSubmitted
                } else {
                    Phase::ClosedPendingRating
                };
            }
            Phase::PreChat | Phase::RatingSubmitted => {}
        }
    }

    /// Clear the descriptor and every piece of in-memory state.
    fn discard(&mut self) {
        self.store.clear();
        self.drafts.clear();
        self.link.close();
        self.reset_local();
    }

    fn reset_local(&mut self) {
        let had_messages = !self.state.messages.is_empty();
        self.typing.reset();
        self.receipts.reset();
        self.pending_draft = None;
        self.auto_started = false;
        self.state = ChatState::new();
        if had_messages {
            self.bus.emit(ChatEvent::TranscriptChanged);
        }
    }

    fn persist(&self, status: SessionStatus, rating_submitted: bool) {
        match self
            .state
            .descriptor(status, rating_submitted, self.clock.now_secs())
        {
            Some(descriptor) => self.store.save(&descriptor),
            None => log::debug!("No chat id yet, nothing to persist"),
        }
    }

    fn reveal(&mut self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        for message in messages {
            reconciler::insert_agent(&mut self.state.messages, message);
        }
        self.bus.emit(ChatEvent::TranscriptChanged);
    }

    fn flush_receipts(&mut self) {
        if let Some(batch) = self.receipts.flush() {
            self.send_receipts(batch);
        }
    }

    fn send_receipts(&self, message_ids: Vec<i64>) {
        let Some(chat_id) = self.state.chat_id.clone() else {
            log::debug!("Dropping read receipts: no chat id");
            return;
        };
        let count = message_ids.len();
        let envelope = OutboundEnvelope::PlayerMarkMessagesAsRead {
            chat_id,
            message_ids,
        };
        if !self.link.send(&envelope) {
            log::debug!("Dropping {} read receipts: socket unavailable", count);
        }
    }

    fn push_notice(&mut self, text: &str) {
        self.state.messages.push(Message::notice(text));
        self.bus.emit(ChatEvent::TranscriptChanged);
    }

    fn observe(&self) -> Observed {
        Observed {
            phase: self.state.phase,
            input_enabled: self.state.input_enabled(),
            is_typing: self.typing.is_visible(),
            bump: self.state.active_bump,
            rating: self.state.rating_state(),
        }
    }

    /// Sync derived fields and emit one event per UI-visible change.
    fn publish(&mut self, before: Observed) {
        self.state.is_typing = self.typing.is_visible();
        let after = self.observe();
        if after == before {
            return;
        }
        if after.phase != before.phase {
            self.bus.emit(ChatEvent::PhaseChanged(after.phase));
        }
        if after.rating != before.rating {
            self.bus.emit(ChatEvent::RatingChanged(after.rating));
        }
        if after.input_enabled != before.input_enabled {
            self.bus.emit(ChatEvent::InputChanged(after.input_enabled));
        }
        if after.is_typing != before.is_typing {
            self.bus.emit(ChatEvent::TypingChanged(after.is_typing));
        }
        if after.bump != before.bump {
            self.bus.emit(ChatEvent::BumpChanged(after.bump.is_some()));
        }
    }
}
