use tracing::{debug, trace};

use crate::{
    avatar::AvatarCache,
    collection::ConversationList,
    order::{sort_conversations, PinOrder},
    pagination::PageTracker,
    types::{
        ChatEvent, Conversation, ConversationId, FetchRequest, FetchResponse, ListFilter,
        ParticipantId, StoreSignal,
    },
};

/// Tuning values for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size for bulk fetches.
    pub page_size: usize,
    /// Trailing lookahead window for load-more triggers.
    pub threshold_window: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            threshold_window: 5,
        }
    }
}

/// The event reconciler: exclusive owner of both list partitions, the
/// pin-order oracle, and the pagination cursors.
///
/// Every mutation is idempotent and partition-safe; events referencing
/// unknown ids degrade to "no change" rather than error. All application of
/// transport results must be serialized through this type.
#[derive(Debug)]
pub struct ConversationStore {
    local_user_id: ParticipantId,
    active: ConversationList,
    archived: ConversationList,
    pin_order: PinOrder,
    active_pages: PageTracker,
    archived_pages: PageTracker,
    avatars: AvatarCache,
    threshold_window: usize,
    pending_refresh: bool,
}

impl ConversationStore {
    /// New store for the given local user.
    pub fn new(local_user_id: ParticipantId, config: StoreConfig) -> Self {
        Self {
            local_user_id,
            active: ConversationList::new(),
            archived: ConversationList::new(),
            pin_order: PinOrder::new(),
            active_pages: PageTracker::new(config.page_size, config.threshold_window),
            archived_pages: PageTracker::new(config.page_size, config.threshold_window),
            avatars: AvatarCache::new(),
            threshold_window: config.threshold_window,
            pending_refresh: false,
        }
    }

    /// Local user the engine reconciles for.
    pub fn local_user_id(&self) -> ParticipantId {
        self.local_user_id
    }

    /// Ordered active partition.
    pub fn active(&self) -> &ConversationList {
        &self.active
    }

    /// Ordered archived partition.
    pub fn archived(&self) -> &ConversationList {
        &self.archived
    }

    /// Server-declared pin precedence.
    pub fn pin_order(&self) -> &PinOrder {
        &self.pin_order
    }

    /// Avatar cache pruned against the currently referenced image URLs.
    pub fn avatars(&self) -> &AvatarCache {
        &self.avatars
    }

    /// Mutable avatar cache access for the application image loader.
    pub fn avatars_mut(&mut self) -> &mut AvatarCache {
        &mut self.avatars
    }

    /// Display-order index of an id in the active partition.
    pub fn index_of(&self, id: ConversationId) -> Option<usize> {
        self.active.index_of(id)
    }

    /// Active conversations matching a folder or search filter.
    pub fn filtered(&self, filter: &ListFilter) -> Vec<&Conversation> {
        self.active.filtered(filter)
    }

    /// Whether a load-more triggered at `current_id` may dispatch.
    pub fn can_load_more(&self, current_id: ConversationId) -> bool {
        self.active_pages.can_load_more(current_id)
    }

    /// Whether an active-partition fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.active_pages.is_loading()
    }

    /// Begin a load-more and return the fetch request to dispatch.
    pub fn prepare_for_load_more(&mut self) -> FetchRequest {
        self.active_pages.prepare_for_load_more(self.active.len());
        FetchRequest::page(self.active_pages.count(), self.active_pages.offset())
    }

    /// Release one partition's pagination bookkeeping after a failed fetch.
    pub fn abort_load(&mut self, archived: bool) {
        if archived {
            self.archived_pages.abort();
        } else {
            self.active_pages.abort();
        }
    }

    /// Begin a refresh cycle with silent-clear semantics.
    ///
    /// The collection is not emptied here; the next active first page
    /// replaces it atomically, so the UI never renders an intermediate
    /// empty list.
    pub fn begin_refresh(&mut self) -> FetchRequest {
        self.pending_refresh = true;
        self.active_pages.reset();
        self.active_pages.prepare_for_load_more(0);
        FetchRequest::page(self.active_pages.count(), 0)
    }

    /// Begin an archived-partition fetch.
    pub fn prepare_archived_fetch(&mut self) -> FetchRequest {
        self.archived_pages.prepare_for_load_more(self.archived.len());
        let mut request =
            FetchRequest::page(self.archived_pages.count(), self.archived_pages.offset());
        request.archived = true;
        request
    }

    /// Merge one bulk page into the targeted partition.
    ///
    /// Existing records are merged in place, new ones inserted, and the
    /// partition re-sorted once for the whole batch. A missing `result` is
    /// a transport failure and degrades to "no change".
    pub fn apply_page(&mut self, response: &FetchResponse, archived: bool) -> Vec<StoreSignal> {
        let Some(items) = response.result.as_ref() else {
            debug!(
                unique_id = %response.unique_id,
                "page response carried no result; leaving state untouched"
            );
            if archived {
                self.archived_pages.abort();
            } else {
                self.active_pages.abort();
            }
            return Vec::new();
        };

        if !archived && self.pending_refresh {
            trace!("replacing active partition for refresh cycle");
            self.active.clear();
            self.pending_refresh = false;
        }

        for incoming in items {
            let other = if archived { &self.active } else { &self.archived };
            if other.contains(incoming.id) {
                debug!(
                    conversation_id = incoming.id,
                    "page item belongs to the other partition; skipping"
                );
                continue;
            }
            let mut record = incoming.clone();
            record.archived = archived;
            if archived {
                self.archived.merge_or_insert(record);
            } else {
                self.active.merge_or_insert(record);
            }
        }

        if archived {
            self.archived_pages.finish(response.has_next);
            sort_conversations(self.archived.items_mut(), &self.pin_order);
        } else {
            self.pin_order.seed_from_page(items);
            self.active_pages.finish(response.has_next);
            self.resort_active();
        }
        self.prune_avatars();
        vec![StoreSignal::ListChanged]
    }

    /// Merge the response of an on-demand single-conversation fetch.
    ///
    /// Unlike [`apply_page`](Self::apply_page) this leaves the pagination
    /// cursors untouched; the response exists only to backfill a
    /// conversation a push event referenced before any page delivered it.
    pub fn apply_missed(&mut self, response: &FetchResponse) -> Vec<StoreSignal> {
        let Some(items) = response.result.as_ref() else {
            debug!(
                unique_id = %response.unique_id,
                "single-conversation response carried no result"
            );
            return Vec::new();
        };

        let mut changed = false;
        for incoming in items {
            if self.archived.contains(incoming.id) {
                continue;
            }
            let mut record = incoming.clone();
            record.archived = false;
            self.active.merge_or_insert(record);
            changed = true;
        }
        if !changed {
            return Vec::new();
        }
        self.resort_active();
        self.prune_avatars();
        vec![StoreSignal::ListChanged]
    }

    /// Apply one push event, honoring the idempotence and monotonicity
    /// rules. Returns the signals produced by the mutation.
    pub fn apply_event(&mut self, event: &ChatEvent) -> Vec<StoreSignal> {
        match event {
            ChatEvent::NewMessage {
                conversation_id,
                message,
            } => self.on_new_message(*conversation_id, message),
            ChatEvent::Pin { conversation_id } => self.on_pin(*conversation_id, true),
            ChatEvent::Unpin { conversation_id } => self.on_pin(*conversation_id, false),
            ChatEvent::Mute { conversation_id } => self.on_mute(*conversation_id, true),
            ChatEvent::Unmute { conversation_id } => self.on_mute(*conversation_id, false),
            ChatEvent::Archive { conversation_id } => self.on_archive(*conversation_id),
            ChatEvent::Unarchive { conversation_id } => self.on_unarchive(*conversation_id),
            ChatEvent::UnreadCountChanged {
                conversation_id,
                count,
            } => self.on_unread_count(*conversation_id, *count),
            ChatEvent::LastSeenUpdated {
                conversation_id,
                message_id,
                time,
                nanos,
                unread_count,
            } => self.on_last_seen(*conversation_id, *message_id, *time, *nanos, *unread_count),
            ChatEvent::Deleted { conversation_id }
            | ChatEvent::Spammed { conversation_id }
            | ChatEvent::Left { conversation_id } => self.on_removed(*conversation_id),
            ChatEvent::Created { conversation } => self.on_created(conversation.clone(), None),
            ChatEvent::Joined {
                conversation,
                participant_id,
            } => self.on_created(conversation.clone(), Some(*participant_id)),
            ChatEvent::UserRemoved {
                conversation_id,
                participant_id,
            } => self.on_user_removed(*conversation_id, *participant_id),
            ChatEvent::ChangedType {
                conversation_id,
                kind,
            } => self.on_changed_type(*conversation_id, *kind),
            ChatEvent::Typing { .. } => {
                // Ephemeral; handled by the typing tracker, never persisted.
                Vec::new()
            }
        }
    }

    fn on_new_message(
        &mut self,
        id: ConversationId,
        message: &crate::types::MessageSummary,
    ) -> Vec<StoreSignal> {
        let local_user_id = self.local_user_id;
        let in_active = self.active.contains(id);
        let found = if in_active {
            self.active.get_mut(id)
        } else {
            self.archived.get_mut(id)
        };
        let Some(conversation) = found else {
            debug!(conversation_id = id, "message for unknown conversation; requesting fetch");
            return vec![StoreSignal::FetchConversation(id)];
        };

        if conversation
            .last_message
            .as_ref()
            .is_some_and(|last| last.id == message.id)
        {
            trace!(conversation_id = id, message_id = message.id, "duplicate message event");
            return Vec::new();
        }

        conversation.time = message.time;
        conversation.last_message = Some(message.clone());
        if message.sender_id == local_user_id {
            conversation.unread_count = 0;
            conversation.last_seen_message_id = message.id;
            conversation.last_seen_time = message.time;
        } else {
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }

        let pinned = conversation.pinned;
        if in_active {
            // Pinned position is fixed by the oracle; skip the re-sort.
            if !pinned {
                self.resort_active();
            }
        } else {
            sort_conversations(self.archived.items_mut(), &self.pin_order);
        }
        vec![StoreSignal::ListChanged]
    }

    fn on_pin(&mut self, id: ConversationId, pinned: bool) -> Vec<StoreSignal> {
        let Some(conversation) = self.active.get_mut(id) else {
            debug!(conversation_id = id, pinned, "pin event for unknown conversation; dropped");
            return Vec::new();
        };
        conversation.pinned = pinned;
        if pinned {
            self.pin_order.promote(id);
        } else {
            self.pin_order.remove(id);
        }
        self.resort_active();
        vec![StoreSignal::ListChanged]
    }

    fn on_mute(&mut self, id: ConversationId, muted: bool) -> Vec<StoreSignal> {
        let Some(conversation) = self.find_mut(id) else {
            debug!(conversation_id = id, muted, "mute event for unknown conversation; dropped");
            return Vec::new();
        };
        if conversation.muted == muted {
            return Vec::new();
        }
        conversation.muted = muted;
        // Mute has no sort-order effect.
        vec![StoreSignal::ListChanged]
    }

    fn on_archive(&mut self, id: ConversationId) -> Vec<StoreSignal> {
        let Some(mut conversation) = self.active.remove(id) else {
            debug!(conversation_id = id, "archive event for conversation not in active; dropped");
            return Vec::new();
        };
        conversation.archived = true;
        // Oracle membership mirrors pinned *active* conversations.
        self.pin_order.remove(id);
        self.archived.merge_or_insert(conversation);
        sort_conversations(self.archived.items_mut(), &self.pin_order);
        self.resort_active();
        self.prune_avatars();
        vec![StoreSignal::ListChanged]
    }

    fn on_unarchive(&mut self, id: ConversationId) -> Vec<StoreSignal> {
        let Some(mut conversation) = self.archived.remove(id) else {
            debug!(
                conversation_id = id,
                "unarchive event for conversation not in archived; dropped"
            );
            return Vec::new();
        };
        conversation.archived = false;
        if conversation.pinned {
            self.pin_order.promote(id);
        }
        self.active.merge_or_insert(conversation);
        self.resort_active();
        self.prune_avatars();
        vec![StoreSignal::ListChanged]
    }

    fn on_unread_count(&mut self, id: ConversationId, count: u32) -> Vec<StoreSignal> {
        let Some(conversation) = self.find_mut(id) else {
            debug!(conversation_id = id, "unread push for unknown conversation; dropped");
            return Vec::new();
        };
        // Monotonic-decrease guard: a stale push must never re-inflate a
        // count the user has already cleared by reading.
        if count > conversation.unread_count {
            trace!(
                conversation_id = id,
                stored = conversation.unread_count,
                pushed = count,
                "rejecting unread push above stored count"
            );
            return Vec::new();
        }
        if count == conversation.unread_count {
            return Vec::new();
        }
        conversation.unread_count = count;
        vec![StoreSignal::ListChanged]
    }

    fn on_last_seen(
        &mut self,
        id: ConversationId,
        message_id: i64,
        time: u64,
        nanos: u64,
        unread_count: u32,
    ) -> Vec<StoreSignal> {
        let Some(conversation) = self.find_mut(id) else {
            debug!(conversation_id = id, "last-seen push for unknown conversation; dropped");
            return Vec::new();
        };
        // Forward-only read cursor.
        if time <= conversation.last_seen_time {
            return Vec::new();
        }
        conversation.last_seen_message_id = message_id;
        conversation.last_seen_time = time;
        conversation.last_seen_nanos = nanos;
        conversation.unread_count = unread_count;
        if unread_count == 0 {
            conversation.mentioned = false;
        }
        vec![StoreSignal::ListChanged]
    }

    fn on_removed(&mut self, id: ConversationId) -> Vec<StoreSignal> {
        let removed = self
            .active
            .remove(id)
            .or_else(|| self.archived.remove(id));
        let Some(conversation) = removed else {
            debug!(conversation_id = id, "removal event for unknown conversation; dropped");
            return Vec::new();
        };
        if conversation.pinned {
            self.pin_order.remove(id);
        }
        self.resort_active();
        self.prune_avatars();
        vec![StoreSignal::ListChanged]
    }

    fn on_created(
        &mut self,
        mut conversation: Conversation,
        joined_participant: Option<ParticipantId>,
    ) -> Vec<StoreSignal> {
        let id = conversation.id;
        if self.archived.contains(id) {
            debug!(conversation_id = id, "created/joined event for archived conversation; dropped");
            return Vec::new();
        }
        conversation.archived = false;
        self.active.merge_or_insert(conversation);
        self.resort_active();
        self.prune_avatars();

        let mut signals = vec![StoreSignal::ListChanged];
        if joined_participant == Some(self.local_user_id) {
            signals.push(StoreSignal::ShowThread(id));
        }
        signals
    }

    fn on_user_removed(
        &mut self,
        id: ConversationId,
        participant_id: ParticipantId,
    ) -> Vec<StoreSignal> {
        if participant_id == self.local_user_id {
            return self.on_removed(id);
        }
        let Some(conversation) = self.find_mut(id) else {
            debug!(conversation_id = id, "participant removal for unknown conversation; dropped");
            return Vec::new();
        };
        conversation.participant_count = conversation.participant_count.saturating_sub(1);
        vec![StoreSignal::ListChanged]
    }

    fn on_changed_type(
        &mut self,
        id: ConversationId,
        kind: crate::types::ConversationKind,
    ) -> Vec<StoreSignal> {
        let Some(conversation) = self.find_mut(id) else {
            debug!(conversation_id = id, "type change for unknown conversation; dropped");
            return Vec::new();
        };
        if conversation.kind == kind {
            return Vec::new();
        }
        conversation.kind = kind;
        vec![StoreSignal::ListChanged]
    }

    fn find_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        if self.active.contains(id) {
            self.active.get_mut(id)
        } else {
            self.archived.get_mut(id)
        }
    }

    fn resort_active(&mut self) {
        sort_conversations(self.active.items_mut(), &self.pin_order);
        self.active_pages
            .set_threshold_ids(self.active.tail_ids(self.threshold_window));
    }

    fn prune_avatars(&mut self) {
        let referenced: Vec<String> = self
            .active
            .iter()
            .chain(self.archived.iter())
            .filter_map(|c| c.resolved_image())
            .collect();
        self.avatars
            .prune_unreferenced(referenced.iter().map(String::as_str));
    }
}
