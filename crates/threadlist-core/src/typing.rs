use std::collections::HashMap;

use crate::types::{ConversationId, ParticipantId};

/// Per-conversation typing indicator state.
///
/// `Idle -> Showing` on a qualifying event, back to `Idle` once no refresh
/// arrives within the expiry window. A qualifying event while already
/// Showing only refreshes the last-activity timestamp; the indicator is
/// debounced, not re-triggered. This state is never written back to the
/// server.
#[derive(Debug, Clone, Default)]
pub struct TypingTracker {
    entries: HashMap<ConversationId, TypingEntry>,
}

#[derive(Debug, Clone)]
struct TypingEntry {
    participant_id: ParticipantId,
    last_activity_ms: u64,
}

impl TypingTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a conversation currently shows a typing indicator.
    pub fn is_showing(&self, id: ConversationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Participant shown as typing in a conversation, when any.
    pub fn showing_participant(&self, id: ConversationId) -> Option<ParticipantId> {
        self.entries.get(&id).map(|entry| entry.participant_id)
    }

    /// Record a qualifying event.
    ///
    /// Returns `true` only on the `Idle -> Showing` transition; refreshes
    /// while already Showing return `false`.
    pub fn record(&mut self, id: ConversationId, participant_id: ParticipantId, now_ms: u64) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.participant_id = participant_id;
                entry.last_activity_ms = now_ms;
                false
            }
            None => {
                self.entries.insert(
                    id,
                    TypingEntry {
                        participant_id,
                        last_activity_ms: now_ms,
                    },
                );
                true
            }
        }
    }

    /// Expire entries idle longer than `expiry_ms`.
    ///
    /// Returns the conversations that transitioned back to `Idle`.
    pub fn sweep(&mut self, now_ms: u64, expiry_ms: u64) -> Vec<ConversationId> {
        let mut expired: Vec<ConversationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| now_ms.saturating_sub(entry.last_activity_ms) > expiry_ms)
            .map(|(&id, _)| id)
            .collect();
        expired.sort_unstable();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    /// Drop an entry immediately, e.g. when its conversation is removed.
    pub fn clear(&mut self, id: ConversationId) {
        self.entries.remove(&id);
    }
}
