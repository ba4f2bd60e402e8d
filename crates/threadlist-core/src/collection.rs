use crate::types::{Conversation, ConversationId, ConversationKind, ListFilter};

/// Order-preserving, id-unique collection of conversations.
///
/// The active and archived partitions of the engine are two values of this
/// type; a conversation belongs to exactly one of them at any time.
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    items: Vec<Conversation>,
}

impl ConversationList {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current items in display order.
    pub fn items(&self) -> &[Conversation] {
        &self.items
    }

    /// Mutable view used by the sort engine.
    pub(crate) fn items_mut(&mut self) -> &mut Vec<Conversation> {
        &mut self.items
    }

    /// Number of conversations held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an id is present.
    pub fn contains(&self, id: ConversationId) -> bool {
        self.index_of(id).is_some()
    }

    /// Display-order index of an id.
    pub fn index_of(&self, id: ConversationId) -> Option<usize> {
        self.items.iter().position(|c| c.id == id)
    }

    /// Shared reference by id.
    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == id)
    }

    /// Exclusive reference by id.
    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.items.iter_mut().find(|c| c.id == id)
    }

    /// Insert a conversation, or merge fields in place when the id exists.
    ///
    /// Returns `true` when a new record was inserted.
    pub fn merge_or_insert(&mut self, incoming: Conversation) -> bool {
        match self.get_mut(incoming.id) {
            Some(existing) => {
                existing.merge_from(&incoming);
                false
            }
            None => {
                self.items.push(incoming);
                true
            }
        }
    }

    /// Insert only when the id is absent; returns `false` on duplicates.
    pub fn insert(&mut self, conversation: Conversation) -> bool {
        if self.contains(conversation.id) {
            return false;
        }
        self.items.push(conversation);
        true
    }

    /// Remove a conversation by id, returning the owned record.
    pub fn remove(&mut self, id: ConversationId) -> Option<Conversation> {
        let index = self.index_of(id)?;
        Some(self.items.remove(index))
    }

    /// Drop every conversation; used by silent-clear refresh replacement.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Trailing ids of the current display order, newest window last.
    pub fn tail_ids(&self, window: usize) -> Vec<ConversationId> {
        let start = self.items.len().saturating_sub(window);
        self.items[start..].iter().map(|c| c.id).collect()
    }

    /// Conversations matching a folder or search filter, in display order.
    pub fn filtered(&self, filter: &ListFilter) -> Vec<&Conversation> {
        match filter {
            ListFilter::Folder(kind) => self.items.iter().filter(|c| c.kind == *kind).collect(),
            ListFilter::Search(text) => {
                let needle = text.to_lowercase();
                self.items
                    .iter()
                    .filter(|c| c.title.to_lowercase().contains(&needle))
                    .collect()
            }
        }
    }

    /// Iterate conversations in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.items.iter()
    }
}

/// Convenience filter constructor for folder queries.
pub fn folder(kind: ConversationKind) -> ListFilter {
    ListFilter::Folder(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: ConversationId, title: &str) -> Conversation {
        Conversation {
            id,
            title: title.to_owned(),
            ..Conversation::default()
        }
    }

    #[test]
    fn merge_or_insert_is_id_unique() {
        let mut list = ConversationList::new();
        assert!(list.merge_or_insert(conversation(1, "one")));
        assert!(!list.merge_or_insert(conversation(1, "one again")));

        assert_eq!(list.len(), 1);
        assert_eq!(list.get(1).map(|c| c.title.as_str()), Some("one again"));
    }

    #[test]
    fn merge_preserves_record_position() {
        let mut list = ConversationList::new();
        list.merge_or_insert(conversation(1, "one"));
        list.merge_or_insert(conversation(2, "two"));
        list.merge_or_insert(conversation(1, "one updated"));

        assert_eq!(list.index_of(1), Some(0));
        assert_eq!(list.index_of(2), Some(1));
    }

    #[test]
    fn remove_returns_owned_record() {
        let mut list = ConversationList::new();
        list.merge_or_insert(conversation(5, "five"));

        let removed = list.remove(5).expect("record should be removable");
        assert_eq!(removed.id, 5);
        assert!(list.is_empty());
        assert_eq!(list.remove(5), None);
    }

    #[test]
    fn tail_ids_returns_trailing_window() {
        let mut list = ConversationList::new();
        for id in 1..=5 {
            list.merge_or_insert(conversation(id, "c"));
        }

        assert_eq!(list.tail_ids(2), vec![4, 5]);
        assert_eq!(list.tail_ids(10), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn search_filter_is_case_insensitive() {
        let mut list = ConversationList::new();
        list.merge_or_insert(conversation(1, "Rust Team"));
        list.merge_or_insert(conversation(2, "family"));

        let hits = list.filtered(&ListFilter::Search("rust".to_owned()));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn folder_filter_matches_kind() {
        let mut list = ConversationList::new();
        let mut group = conversation(1, "g");
        group.kind = ConversationKind::Group;
        list.merge_or_insert(group);
        list.merge_or_insert(conversation(2, "dm"));

        let hits = list.filtered(&folder(ConversationKind::Group));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }
}
