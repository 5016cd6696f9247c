//! MessageReconciler: merges server echoes into the transcript.
//!
//! Invariants: ids in the transcript are unique, an optimistic entry is
//! replaced at its own index (never appended-then-removed), and agent
//! messages never replace anything.

use std::collections::HashSet;

use chat_types::message::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// An optimistic entry was confirmed in place
    Replaced(usize),
    /// The id was already present; metadata was merged
    Merged(usize),
    Appended(usize),
}

/// Merge the server echo of one of the player's own messages.
///
/// Matches the newest undelivered optimistic entry with identical content,
/// scanning newest-first. Without a match the echo is appended, which covers
/// messages sent from another tab and late echoes.
pub fn reconcile_own(messages: &mut Vec<Message>, incoming: Message) -> Reconciled {
    debug_assert_eq!(incoming.role, Role::User);
    if let Some(pos) = position_of(messages, &incoming.id) {
        merge_metadata(&mut messages[pos], &incoming);
        return Reconciled::Merged(pos);
    }
    let matched = messages
        .iter()
        .rposition(|m| m.is_pending() && m.content == incoming.content);
    match matched {
        Some(pos) => {
            let optimistic = std::mem::replace(&mut messages[pos], incoming);
            let confirmed = &mut messages[pos];
            if confirmed.sent_at.is_none() {
                confirmed.sent_at = optimistic.sent_at;
            }
            if confirmed.attachment.is_none() {
                confirmed.attachment = optimistic.attachment;
            }
            Reconciled::Replaced(pos)
        }
        None => {
            messages.push(incoming);
            Reconciled::Appended(messages.len() - 1)
        }
    }
}

/// Insert an agent message as a new entry unless its id is already known.
pub fn insert_agent(messages: &mut Vec<Message>, incoming: Message) -> Reconciled {
    if let Some(pos) = position_of(messages, &incoming.id) {
        merge_metadata(&mut messages[pos], &incoming);
        return Reconciled::Merged(pos);
    }
    messages.push(incoming);
    Reconciled::Appended(messages.len() - 1)
}

/// Discard the current transcript in favour of a server snapshot.
pub fn replace_history(messages: &mut Vec<Message>, history: Vec<Message>) {
    let mut seen = HashSet::new();
    messages.clear();
    messages.extend(history.into_iter().filter(|m| seen.insert(m.id.clone())));
}

/// Apply `f` to the entry with `id`. Returns whether one was found.
pub fn patch(messages: &mut [Message], id: &str, f: impl FnOnce(&mut Message)) -> bool {
    match messages.iter_mut().find(|m| m.id == id) {
        Some(msg) => {
            f(msg);
            true
        }
        None => false,
    }
}

fn position_of(messages: &[Message], id: &str) -> Option<usize> {
    messages.iter().position(|m| m.id == id)
}

fn merge_metadata(existing: &mut Message, incoming: &Message) {
    if incoming.delivered_at.is_some() {
        existing.delivered_at = incoming.delivered_at;
    }
    if incoming.seen_by.is_some() {
        existing.seen_by = incoming.seen_by.clone();
    }
    if existing.sent_at.is_none() {
        existing.sent_at = incoming.sent_at;
    }
}
