//! Conversation-list synchronization engine core.
//!
//! This crate holds the pure state machine that keeps a locally held,
//! ordered collection of conversation summaries consistent with a remote
//! chat backend: bulk page merging, push-event reconciliation with
//! monotonicity guards, deterministic pin-aware ordering, and pagination
//! bookkeeping. It performs no I/O of its own.

/// Avatar cache keyed by image URL with mark-and-sweep pruning.
pub mod avatar;
/// Order-preserving, id-unique conversation collection.
pub mod collection;
/// Stable engine error types shared across the transport boundary.
pub mod error;
/// Lazy decoding of opaque conversation metadata blobs.
pub mod metadata;
/// Pin-order oracle and the deterministic sort over conversations.
pub mod order;
/// Offset/count/has-more pagination cursor state.
pub mod pagination;
/// The event reconciler owning both list partitions.
pub mod store;
/// Ephemeral per-conversation typing indicator state.
pub mod typing;
/// Wire-facing conversation, event, and fetch types.
pub mod types;

pub use avatar::{AvatarCache, AvatarEntry};
pub use collection::ConversationList;
pub use error::{EngineError, EngineErrorCategory};
pub use metadata::decode_image_link;
pub use order::{sort_conversations, PinOrder};
pub use pagination::PageTracker;
pub use store::{ConversationStore, StoreConfig};
pub use typing::TypingTracker;
pub use types::{
    ChatEvent, Conversation, ConversationId, ConversationKind, FetchRequest, FetchResponse,
    ListFilter, MessageSummary, ParticipantId, StoreSignal,
};
