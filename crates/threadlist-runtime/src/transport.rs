use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use threadlist_core::{
    ChatEvent, Conversation, ConversationId, ConversationKind, EngineError, FetchRequest,
    FetchResponse,
};

/// Request payload for creating a new conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRequest {
    /// Display title of the new thread.
    pub title: String,
    /// Conversation flavor.
    pub kind: ConversationKind,
    /// Initial participants beside the local user.
    pub participant_ids: Vec<i64>,
}

/// Transport/SDK boundary the engine drives.
///
/// Mutation intents never mutate local state synchronously; every local
/// effect arrives later through the event feed as a confirmation event.
/// Retry policy, if any, lives behind this trait, not in the engine.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch one page of conversations.
    async fn fetch_conversations(
        &self,
        request: FetchRequest,
    ) -> Result<FetchResponse, EngineError>;

    /// Request a pin; confirmed via [`ChatEvent::Pin`].
    async fn pin(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request an unpin; confirmed via [`ChatEvent::Unpin`].
    async fn unpin(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request a mute; confirmed via [`ChatEvent::Mute`].
    async fn mute(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request an unmute; confirmed via [`ChatEvent::Unmute`].
    async fn unmute(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request an archive; confirmed via [`ChatEvent::Archive`].
    async fn archive(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request an unarchive; confirmed via [`ChatEvent::Unarchive`].
    async fn unarchive(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Request a delete; confirmed via [`ChatEvent::Deleted`].
    async fn delete(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Leave a thread; confirmed via [`ChatEvent::Left`].
    async fn leave(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Clear thread history server-side.
    async fn clear_history(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Report a thread as spam; confirmed via [`ChatEvent::Spammed`].
    async fn spam(&self, id: ConversationId) -> Result<(), EngineError>;
    /// Create a thread; confirmed via [`ChatEvent::Created`].
    async fn create(&self, request: CreateRequest) -> Result<Conversation, EngineError>;
    /// Add participants; each confirmed via [`ChatEvent::Joined`].
    async fn add_participants(
        &self,
        id: ConversationId,
        contact_ids: Vec<i64>,
    ) -> Result<(), EngineError>;

    /// Subscribe to the asynchronous, unordered event feed.
    fn events(&self) -> broadcast::Receiver<ChatEvent>;
}

#[derive(Debug, Default)]
struct ServerState {
    active: Vec<Conversation>,
    archived: Vec<Conversation>,
    next_id: ConversationId,
}

/// In-memory transport with confirmation-driven event emission.
///
/// Mutation intents update the scripted server state and emit the matching
/// confirmation event, mirroring how the real backend acknowledges
/// requests. Used by tests and the smoke binary.
#[derive(Debug)]
pub struct InMemoryTransport {
    state: Mutex<ServerState>,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl InMemoryTransport {
    /// Transport seeded with a server-side active conversation set.
    pub fn new(active: Vec<Conversation>) -> Self {
        let next_id = active.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let (event_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(ServerState {
                active,
                archived: Vec::new(),
                next_id,
            }),
            event_tx,
        }
    }

    /// Inject a push event, as the remote backend would.
    pub fn push_event(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }

    fn with_conversation<R>(
        &self,
        id: ConversationId,
        apply: impl FnOnce(&mut Conversation) -> R,
    ) -> Result<R, EngineError> {
        let mut guard = self.state.lock().expect("transport state lock poisoned");
        let state = &mut *guard;
        let found = state
            .active
            .iter_mut()
            .chain(state.archived.iter_mut())
            .find(|c| c.id == id);
        match found {
            Some(conversation) => Ok(apply(conversation)),
            None => Err(EngineError::transport(
                "unknown_conversation",
                format!("conversation {id} does not exist on the server"),
            )),
        }
    }
}

#[async_trait]
impl ChatTransport for InMemoryTransport {
    async fn fetch_conversations(
        &self,
        request: FetchRequest,
    ) -> Result<FetchResponse, EngineError> {
        let state = self.state.lock().expect("transport state lock poisoned");
        let source = if request.archived {
            &state.archived
        } else {
            &state.active
        };

        let filtered: Vec<&Conversation> = match &request.thread_ids {
            Some(ids) => source.iter().filter(|c| ids.contains(&c.id)).collect(),
            None => source.iter().collect(),
        };

        let total_count = filtered.len();
        let page: Vec<Conversation> = filtered
            .into_iter()
            .skip(request.offset)
            .take(request.count)
            .cloned()
            .collect();
        let has_next = request.offset + page.len() < total_count;

        Ok(FetchResponse {
            result: Some(page),
            has_next,
            total_count,
            unique_id: Uuid::new_v4().to_string(),
        })
    }

    async fn pin(&self, id: ConversationId) -> Result<(), EngineError> {
        self.with_conversation(id, |c| c.pinned = true)?;
        self.emit(ChatEvent::Pin {
            conversation_id: id,
        });
        Ok(())
    }

    async fn unpin(&self, id: ConversationId) -> Result<(), EngineError> {
        self.with_conversation(id, |c| c.pinned = false)?;
        self.emit(ChatEvent::Unpin {
            conversation_id: id,
        });
        Ok(())
    }

    async fn mute(&self, id: ConversationId) -> Result<(), EngineError> {
        self.with_conversation(id, |c| c.muted = true)?;
        self.emit(ChatEvent::Mute {
            conversation_id: id,
        });
        Ok(())
    }

    async fn unmute(&self, id: ConversationId) -> Result<(), EngineError> {
        self.with_conversation(id, |c| c.muted = false)?;
        self.emit(ChatEvent::Unmute {
            conversation_id: id,
        });
        Ok(())
    }

    async fn archive(&self, id: ConversationId) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().expect("transport state lock poisoned");
            let Some(index) = state.active.iter().position(|c| c.id == id) else {
                return Err(EngineError::transport(
                    "unknown_conversation",
                    format!("conversation {id} is not active"),
                ));
            };
            let mut conversation = state.active.remove(index);
            conversation.archived = true;
            state.archived.push(conversation);
        }
        self.emit(ChatEvent::Archive {
            conversation_id: id,
        });
        Ok(())
    }

    async fn unarchive(&self, id: ConversationId) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().expect("transport state lock poisoned");
            let Some(index) = state.archived.iter().position(|c| c.id == id) else {
                return Err(EngineError::transport(
                    "unknown_conversation",
                    format!("conversation {id} is not archived"),
                ));
            };
            let mut conversation = state.archived.remove(index);
            conversation.archived = false;
            state.active.push(conversation);
        }
        self.emit(ChatEvent::Unarchive {
            conversation_id: id,
        });
        Ok(())
    }

    async fn delete(&self, id: ConversationId) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("transport state lock poisoned");
        state.active.retain(|c| c.id != id);
        state.archived.retain(|c| c.id != id);
        drop(state);
        self.emit(ChatEvent::Deleted {
            conversation_id: id,
        });
        Ok(())
    }

    async fn leave(&self, id: ConversationId) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("transport state lock poisoned");
        state.active.retain(|c| c.id != id);
        state.archived.retain(|c| c.id != id);
        drop(state);
        self.emit(ChatEvent::Left {
            conversation_id: id,
        });
        Ok(())
    }

    async fn clear_history(&self, id: ConversationId) -> Result<(), EngineError> {
        self.with_conversation(id, |c| {
            c.last_message = None;
            c.unread_count = 0;
        })?;
        self.emit(ChatEvent::UnreadCountChanged {
            conversation_id: id,
            count: 0,
        });
        Ok(())
    }

    async fn spam(&self, id: ConversationId) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("transport state lock poisoned");
        state.active.retain(|c| c.id != id);
        state.archived.retain(|c| c.id != id);
        drop(state);
        self.emit(ChatEvent::Spammed {
            conversation_id: id,
        });
        Ok(())
    }

    async fn create(&self, request: CreateRequest) -> Result<Conversation, EngineError> {
        let conversation = {
            let mut state = self.state.lock().expect("transport state lock poisoned");
            let conversation = Conversation {
                id: state.next_id,
                title: request.title,
                kind: request.kind,
                participant_count: request.participant_ids.len() as u32 + 1,
                ..Conversation::default()
            };
            state.next_id += 1;
            state.active.push(conversation.clone());
            conversation
        };
        self.emit(ChatEvent::Created {
            conversation: conversation.clone(),
        });
        Ok(conversation)
    }

    async fn add_participants(
        &self,
        id: ConversationId,
        contact_ids: Vec<i64>,
    ) -> Result<(), EngineError> {
        let conversation = self.with_conversation(id, |c| {
            c.participant_count = c.participant_count.saturating_add(contact_ids.len() as u32);
            c.clone()
        })?;
        for participant_id in contact_ids {
            self.emit(ChatEvent::Joined {
                conversation: conversation.clone(),
                participant_id,
            });
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }
}
