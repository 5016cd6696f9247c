//! ProtocolReducer: maps (state, inbound envelope) to (next state, effects).
//!
//! The reducer mutates [`ChatState`] only. Anything that touches a port or a
//! timer is returned as an [`Effect`] for the session to carry out.

use chat_types::envelope::{InboundEnvelope, ServerEvent, WireMessage};
use chat_types::i18n::Language;
use chat_types::message::{Message, Role, SeenReceipt};
use chat_types::session::SessionStatus;

use crate::reconciler;
use crate::state::{ActiveBump, ChatState, Phase};

pub struct ReduceContext {
    pub language: Language,
    pub now_ms: u64,
}

impl ReduceContext {
    fn now_secs(&self) -> i64 {
        (self.now_ms / 1000) as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    TranscriptChanged,
    Persist {
        status: SessionStatus,
        rating_submitted: bool,
    },
    /// Forget the session entirely: clear the descriptor and return to pre-chat
    Discard,
    /// Hold an agent message behind the typing indicator
    QueueAgentMessage(Message),
    /// Release queued agent messages now and hide the indicator
    StopTyping,
}

pub fn reduce(state: &mut ChatState, envelope: InboundEnvelope, ctx: &ReduceContext) -> Vec<Effect> {
    match envelope {
        InboundEnvelope::Bump(event) => reduce_event(state, event, ctx),
        InboundEnvelope::ExistingMessages { chat_id, messages } => {
            handle_history(state, chat_id, messages)
        }
    }
}

fn reduce_event(state: &mut ChatState, event: ServerEvent, ctx: &ReduceContext) -> Vec<Effect> {
    match event {
        ServerEvent::StartChatSuccess {
            chat_id,
            token,
            full_name,
        } => handle_start_success(state, chat_id, token, full_name, ctx),

        ServerEvent::RejoinChatSuccess { chat_id, token } => {
            handle_rejoin_success(state, chat_id, token)
        }

        ServerEvent::NewMessage(wire) => handle_new_message(state, wire),

        ServerEvent::MessageDelivered {
            message_id,
            delivered_at,
        } => patched(reconciler::patch(&mut state.messages, &message_id, |m| {
            m.delivered_at = delivered_at;
        })),

        ServerEvent::MessageSeen {
            message_id,
            seen_by,
        } => handle_seen(state, &message_id, seen_by),

        ServerEvent::MessagesMarkedAsRead { message_ids } => {
            let seen_at = ctx.now_secs();
            let mut changed = false;
            for id in &message_ids {
                changed |= reconciler::patch(&mut state.messages, id, |m| m.add_seen(seen_at));
            }
            patched(changed)
        }

        ServerEvent::ChatClosed { by_system } => {
            log::info!("Chat closed by server (system: {})", by_system);
            close_chat(state)
        }

        ServerEvent::ChatRatingSuccess => handle_rating_success(state),

        ServerEvent::PlayerUnauthenticated { is_authenticated } => {
            handle_unauthenticated(state, is_authenticated, ctx)
        }

        ServerEvent::Cooldown {
            seconds_remaining,
            blocked_until,
        } => handle_cooldown(state, seconds_remaining, blocked_until, ctx),

        ServerEvent::Unrecognized { bump_type } => {
            log::debug!("Ignoring unrecognized bump type {}", bump_type);
            vec![]
        }
    }
}

/// Close the active chat. Shared by server-driven closes and `end_chat`.
///
/// A chat in which the player never wrote anything is discarded instead of
/// being offered for rating.
pub fn close_chat(state: &mut ChatState) -> Vec<Effect> {
    match state.phase {
        Phase::PreChat | Phase::ClosedPendingRating | Phase::RatingSubmitted => vec![],
        Phase::Connecting | Phase::Active => {
            state.resuming = false;
            if state.has_user_messages() {
                state.phase = Phase::ClosedPendingRating;
                vec![
                    Effect::StopTyping,
                    Effect::Persist {
                        status: SessionStatus::Closed,
                        rating_submitted: false,
                    },
                ]
            } else {
                vec![Effect::Discard]
            }
        }
    }
}

fn handle_start_success(
    state: &mut ChatState,
    chat_id: Option<String>,
    token: Option<String>,
    full_name: Option<String>,
    ctx: &ReduceContext,
) -> Vec<Effect> {
    if !matches!(state.phase, Phase::Connecting | Phase::Active) {
        log::warn!("startChatSuccess in phase {:?}, ignoring", state.phase);
        return vec![];
    }
    if chat_id.is_some() {
        state.chat_id = chat_id;
    }
    if token.is_some() {
        state.auth_token = token;
    }
    if full_name.is_some() {
        state.identity.name = full_name.clone();
    }
    state.phase = Phase::Active;
    state.link_ready = true;
    state.resuming = false;

    let mut effects = Vec::new();
    if !state.greeted {
        state.greeted = true;
        state
            .messages
            .push(Message::notice(ctx.language.greeting(full_name.as_deref())));
        effects.push(Effect::TranscriptChanged);
    }
    effects.push(Effect::Persist {
        status: SessionStatus::Active,
        rating_submitted: false,
    });
    effects
}

fn handle_rejoin_success(
    state: &mut ChatState,
    chat_id: Option<String>,
    token: Option<String>,
) -> Vec<Effect> {
    if !matches!(state.phase, Phase::Connecting | Phase::Active) {
        log::warn!("rejoinChatSuccess in phase {:?}, ignoring", state.phase);
        return vec![];
    }
    if chat_id.is_some() {
        state.chat_id = chat_id;
    }
    if token.is_some() {
        state.auth_token = token;
    }
    state.phase = Phase::Active;
    state.link_ready = true;
    state.resuming = false;
    state.greeted = true;
    vec![Effect::Persist {
        status: SessionStatus::Active,
        rating_submitted: false,
    }]
}

fn handle_new_message(state: &mut ChatState, wire: WireMessage) -> Vec<Effect> {
    if state.phase == Phase::PreChat {
        return vec![];
    }
    let Some(message) = wire.into_message() else {
        return vec![];
    };
    match message.role {
        Role::Agent => vec![Effect::QueueAgentMessage(message)],
        Role::User => {
            state.user_message_sent = true;
            let outcome = reconciler::reconcile_own(&mut state.messages, message);
            log::debug!("Own message echo: {:?}", outcome);
            vec![Effect::TranscriptChanged]
        }
    }
}

fn handle_seen(state: &mut ChatState, message_id: &str, seen_by: Vec<SeenReceipt>) -> Vec<Effect> {
    patched(reconciler::patch(&mut state.messages, message_id, |m| {
        m.seen_by = Some(seen_by);
    }))
}

fn handle_rating_success(state: &mut ChatState) -> Vec<Effect> {
    if state.phase != Phase::ClosedPendingRating {
        return vec![];
    }
    state.phase = Phase::RatingSubmitted;
    vec![Effect::Persist {
        status: SessionStatus::Closed,
        rating_submitted: true,
    }]
}

fn handle_unauthenticated(
    state: &mut ChatState,
    is_authenticated: Option<bool>,
    ctx: &ReduceContext,
) -> Vec<Effect> {
    if is_authenticated != Some(false) {
        return vec![];
    }
    state.phase = Phase::Active;
    state.link_ready = false;
    state.resuming = false;
    state
        .messages
        .push(Message::notice(ctx.language.auth_failed()));
    vec![Effect::TranscriptChanged]
}

fn handle_cooldown(
    state: &mut ChatState,
    seconds_remaining: Option<u64>,
    blocked_until: Option<i64>,
    ctx: &ReduceContext,
) -> Vec<Effect> {
    let expires_at_ms = match (blocked_until, seconds_remaining) {
        (Some(until), _) => (until.max(0) as u64).saturating_mul(1000),
        (None, Some(secs)) => ctx.now_ms.saturating_add(secs.saturating_mul(1000)),
        (None, None) => {
            log::warn!("Cooldown bump without duration, ignoring");
            return vec![];
        }
    };
    let bump = ActiveBump { expires_at_ms };
    state.active_bump = if bump.is_expired(ctx.now_ms) {
        None
    } else {
        Some(bump)
    };
    vec![]
}

fn handle_history(
    state: &mut ChatState,
    chat_id: Option<String>,
    messages: Vec<WireMessage>,
) -> Vec<Effect> {
    if let (Some(current), Some(incoming)) = (state.chat_id.as_deref(), chat_id.as_deref()) {
        if current != incoming {
            log::warn!("History for chat {} while in chat {}, ignoring", incoming, current);
            return vec![];
        }
    }
    let history: Vec<Message> = messages
        .into_iter()
        .filter_map(WireMessage::into_message)
        .collect();
    state.user_message_sent |= history.iter().any(|m| m.role == Role::User);
    state.greeted = true;
    reconciler::replace_history(&mut state.messages, history);
    vec![Effect::TranscriptChanged]
}

fn patched(changed: bool) -> Vec<Effect> {
    if changed {
        vec![Effect::TranscriptChanged]
    } else {
        vec![]
    }
}
