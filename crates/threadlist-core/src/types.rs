use serde::{Deserialize, Serialize};

/// Server-assigned conversation identity, immutable once created.
pub type ConversationId = i64;

/// Server-assigned participant/user identity.
pub type ParticipantId = i64;

/// Conversation flavor reported by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConversationKind {
    /// Direct one-to-one thread.
    Normal,
    /// Multi-participant group.
    Group,
    /// Broadcast channel.
    Channel,
    /// The local user's self/saved-messages thread.
    SelfThread,
}

impl Default for ConversationKind {
    fn default() -> Self {
        Self::Normal
    }
}

/// Summary of the most recent message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSummary {
    /// Server-assigned message id.
    pub id: i64,
    /// Display-ready preview text.
    pub text: String,
    /// Sender participant id.
    pub sender_id: ParticipantId,
    /// Message timestamp in milliseconds since Unix epoch.
    pub time: u64,
}

/// Mutable record mirroring one remote conversation.
///
/// Owned exclusively by the engine's collection; every update is an in-place
/// field merge so that components holding the id always observe the same
/// logical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Conversation {
    /// Server-assigned id, immutable once created.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Explicit image URL when the server provides one.
    pub image: Option<String>,
    /// Last-activity timestamp in milliseconds, used for recency sort.
    pub time: u64,
    /// Whether the conversation is pinned.
    pub pinned: bool,
    /// Whether notifications are muted.
    pub muted: bool,
    /// Whether the conversation lives in the archived partition.
    pub archived: bool,
    /// Unread message count, merged with a monotonic-decrease guard.
    pub unread_count: u32,
    /// Whether the local user is mentioned in unread history.
    pub mentioned: bool,
    /// Most recent message summary.
    pub last_message: Option<MessageSummary>,
    /// Id of the newest message the local user has read.
    pub last_seen_message_id: i64,
    /// Timestamp of the read cursor in milliseconds.
    pub last_seen_time: u64,
    /// Sub-millisecond component of the read cursor.
    pub last_seen_nanos: u64,
    /// Conversation flavor.
    pub kind: ConversationKind,
    /// Number of participants.
    pub participant_count: u32,
    /// Opaque metadata blob, decoded lazily for computed fields.
    pub metadata: Option<String>,
}

impl Conversation {
    /// Merge server-confirmed fields from `incoming` in place.
    ///
    /// The id never changes and the record is never replaced wholesale.
    pub fn merge_from(&mut self, incoming: &Conversation) {
        debug_assert_eq!(self.id, incoming.id);
        self.title = incoming.title.clone();
        self.image = incoming.image.clone();
        self.time = incoming.time;
        self.pinned = incoming.pinned;
        self.muted = incoming.muted;
        self.archived = incoming.archived;
        self.unread_count = incoming.unread_count;
        self.mentioned = incoming.mentioned;
        if incoming.last_message.is_some() {
            self.last_message = incoming.last_message.clone();
        }
        self.last_seen_message_id = incoming.last_seen_message_id;
        self.last_seen_time = incoming.last_seen_time;
        self.last_seen_nanos = incoming.last_seen_nanos;
        self.kind = incoming.kind;
        self.participant_count = incoming.participant_count;
        if incoming.metadata.is_some() {
            self.metadata = incoming.metadata.clone();
        }
    }

    /// Image URL used for avatar display.
    ///
    /// Prefers the explicit `image` field and falls back to a lazy decode of
    /// the opaque metadata blob.
    pub fn resolved_image(&self) -> Option<String> {
        if self.image.is_some() {
            return self.image.clone();
        }
        self.metadata
            .as_deref()
            .and_then(crate::metadata::decode_image_link)
    }
}

/// Push event delivered by the transport, unordered with respect to
/// pagination responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatEvent {
    /// A new message arrived in a conversation.
    NewMessage {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Summary of the new message.
        message: MessageSummary,
    },
    /// Pin confirmed by the server.
    Pin {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Unpin confirmed by the server.
    Unpin {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Mute confirmed by the server.
    Mute {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Unmute confirmed by the server.
    Unmute {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Archive confirmed by the server.
    Archive {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Unarchive confirmed by the server.
    Unarchive {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Unread-count push from the server.
    UnreadCountChanged {
        /// Target conversation.
        conversation_id: ConversationId,
        /// New count; applied only when it does not exceed the stored count.
        count: u32,
    },
    /// Read-cursor advance confirmed by the server.
    LastSeenUpdated {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Newest read message id.
        message_id: i64,
        /// Read-cursor timestamp in milliseconds.
        time: u64,
        /// Sub-millisecond read-cursor component.
        nanos: u64,
        /// Server-computed remaining unread count.
        unread_count: u32,
    },
    /// Thread deleted on the server.
    Deleted {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Thread created; carries the full new record.
    Created {
        /// The new conversation.
        conversation: Conversation,
    },
    /// A participant joined a thread; carries the full record.
    Joined {
        /// The joined conversation.
        conversation: Conversation,
        /// The participant who joined.
        participant_id: ParticipantId,
    },
    /// A participant was removed from a thread.
    UserRemoved {
        /// Target conversation.
        conversation_id: ConversationId,
        /// The removed participant.
        participant_id: ParticipantId,
    },
    /// The local user left a thread.
    Left {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// Conversation type changed on the server.
    ChangedType {
        /// Target conversation.
        conversation_id: ConversationId,
        /// New conversation flavor.
        kind: ConversationKind,
    },
    /// Thread reported as spam and blocked.
    Spammed {
        /// Target conversation.
        conversation_id: ConversationId,
    },
    /// A participant is typing; feeds the ephemeral sub-view only.
    Typing {
        /// Target conversation.
        conversation_id: ConversationId,
        /// The typing participant.
        participant_id: ParticipantId,
    },
}

impl ChatEvent {
    /// Conversation the event targets, when it carries a bare id.
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::NewMessage {
                conversation_id, ..
            }
            | Self::Pin { conversation_id }
            | Self::Unpin { conversation_id }
            | Self::Mute { conversation_id }
            | Self::Unmute { conversation_id }
            | Self::Archive { conversation_id }
            | Self::Unarchive { conversation_id }
            | Self::UnreadCountChanged {
                conversation_id, ..
            }
            | Self::LastSeenUpdated {
                conversation_id, ..
            }
            | Self::Deleted { conversation_id }
            | Self::UserRemoved {
                conversation_id, ..
            }
            | Self::Left { conversation_id }
            | Self::ChangedType {
                conversation_id, ..
            }
            | Self::Spammed { conversation_id }
            | Self::Typing {
                conversation_id, ..
            } => *conversation_id,
            Self::Created { conversation } | Self::Joined { conversation, .. } => conversation.id,
        }
    }
}

/// Bulk fetch request handed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchRequest {
    /// Page size.
    pub count: usize,
    /// Offset into the server-side ordering.
    pub offset: usize,
    /// Whether the transport may serve the page from its own cache.
    pub cache: bool,
    /// Restrict the fetch to specific conversation ids.
    pub thread_ids: Option<Vec<ConversationId>>,
    /// Fetch the archived partition instead of the active one.
    pub archived: bool,
}

impl FetchRequest {
    /// Request one page of the active partition.
    pub fn page(count: usize, offset: usize) -> Self {
        Self {
            count,
            offset,
            cache: true,
            thread_ids: None,
            archived: false,
        }
    }

    /// Request a single conversation by id (fetch-on-miss path).
    pub fn single(id: ConversationId) -> Self {
        Self {
            count: 1,
            offset: 0,
            cache: false,
            thread_ids: Some(vec![id]),
            archived: false,
        }
    }
}

/// Bulk fetch response returned by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchResponse {
    /// Page payload; `None` on transport failure is treated as a no-op.
    pub result: Option<Vec<Conversation>>,
    /// Whether more pages exist beyond this one.
    pub has_next: bool,
    /// Total server-side count.
    pub total_count: usize,
    /// Correlates the response to its originating request.
    pub unique_id: String,
}

/// Signal emitted by the reconciler after applying an event or a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSignal {
    /// The ordered list content changed; consumers should re-read snapshots.
    ListChanged,
    /// The local user joined a thread the UI should surface.
    ShowThread(ConversationId),
    /// A message referenced an unknown conversation; fetch it on demand.
    FetchConversation(ConversationId),
}

/// Query filter over the active partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    /// Keep only conversations of one flavor.
    Folder(ConversationKind),
    /// Keep conversations whose title contains the text, case-insensitive.
    Search(String),
}
