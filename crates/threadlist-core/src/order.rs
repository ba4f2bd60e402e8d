use std::cmp::Ordering;

use crate::types::{Conversation, ConversationId};

/// Server-declared ordering authority for pinned conversations.
///
/// Populated once from the first page that contains pinned items, then
/// maintained by pin/unpin confirmations: insert-at-front on pin, remove on
/// unpin. The order is never re-derived locally.
#[derive(Debug, Clone, Default)]
pub struct PinOrder {
    ids: Vec<ConversationId>,
}

impl PinOrder {
    /// Empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the oracle has been seeded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in server pin precedence, highest first.
    pub fn ids(&self) -> &[ConversationId] {
        &self.ids
    }

    /// Precedence index of an id, `None` when the oracle does not know it.
    pub fn index_of(&self, id: ConversationId) -> Option<usize> {
        self.ids.iter().position(|&known| known == id)
    }

    /// Seed from the pinned items of a server page, in page order.
    ///
    /// Only the first page carrying pinned items populates the oracle;
    /// later pages never reorder it.
    pub fn seed_from_page(&mut self, page: &[Conversation]) {
        if !self.ids.is_empty() {
            return;
        }
        self.ids = page.iter().filter(|c| c.pinned).map(|c| c.id).collect();
    }

    /// Record a pin confirmation: the id moves to the front. Idempotent.
    pub fn promote(&mut self, id: ConversationId) {
        self.ids.retain(|&known| known != id);
        self.ids.insert(0, id);
    }

    /// Record an unpin confirmation. Idempotent.
    pub fn remove(&mut self, id: ConversationId) {
        self.ids.retain(|&known| known != id);
    }
}

/// Sort conversations into the canonical display order.
///
/// Pinned conversations come first, ordered by oracle precedence; pinned ids
/// the oracle does not know sort after all oracle-known pinned items, by
/// recency. Unpinned conversations follow, newest activity first. The sort
/// is stable, so repeated application with unchanged inputs never reorders
/// equal keys.
pub fn sort_conversations(items: &mut [Conversation], pin_order: &PinOrder) {
    items.sort_by(|a, b| compare(a, b, pin_order));
}

fn compare(a: &Conversation, b: &Conversation, pin_order: &PinOrder) -> Ordering {
    match (a.pinned, b.pinned) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => {
            let rank_a = pin_order.index_of(a.id).unwrap_or(usize::MAX);
            let rank_b = pin_order.index_of(b.id).unwrap_or(usize::MAX);
            rank_a.cmp(&rank_b).then(b.time.cmp(&a.time))
        }
        (false, false) => b.time.cmp(&a.time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: ConversationId, time: u64, pinned: bool) -> Conversation {
        Conversation {
            id,
            time,
            pinned,
            ..Conversation::default()
        }
    }

    #[test]
    fn pinned_sorts_before_unpinned_despite_lower_time() {
        let mut items = vec![conversation(1, 100, false), conversation(2, 50, true)];
        let mut order = PinOrder::new();
        order.seed_from_page(&items);

        sort_conversations(&mut items, &order);
        let ids: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn oracle_precedence_beats_insertion_order() {
        let mut items = vec![conversation(3, 900, true), conversation(7, 100, true)];
        let mut order = PinOrder::new();
        order.promote(3);
        order.promote(7);

        sort_conversations(&mut items, &order);
        let ids: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn oracle_missing_pinned_sorts_after_known_pinned() {
        let mut items = vec![
            conversation(9, 999, true),
            conversation(3, 100, true),
            conversation(4, 500, false),
        ];
        let mut order = PinOrder::new();
        order.promote(3);

        sort_conversations(&mut items, &order);
        let ids: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 9, 4]);
    }

    #[test]
    fn unpinned_sorts_by_time_descending() {
        let mut items = vec![
            conversation(1, 10, false),
            conversation(2, 30, false),
            conversation(3, 20, false),
        ];
        sort_conversations(&mut items, &PinOrder::new());
        let ids: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut items = vec![conversation(1, 100, false), conversation(2, 100, false)];
        let order = PinOrder::new();

        sort_conversations(&mut items, &order);
        let first: Vec<_> = items.iter().map(|c| c.id).collect();
        sort_conversations(&mut items, &order);
        let second: Vec<_> = items.iter().map(|c| c.id).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2]);
    }

    #[test]
    fn seed_ignores_later_pages() {
        let mut order = PinOrder::new();
        order.seed_from_page(&[conversation(2, 50, true), conversation(1, 100, false)]);
        assert_eq!(order.ids(), &[2]);

        order.seed_from_page(&[conversation(8, 10, true)]);
        assert_eq!(order.ids(), &[2]);
    }

    #[test]
    fn promote_is_idempotent() {
        let mut order = PinOrder::new();
        order.promote(4);
        order.promote(4);
        assert_eq!(order.ids(), &[4]);
    }
}
