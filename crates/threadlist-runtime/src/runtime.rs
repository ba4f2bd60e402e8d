use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use threadlist_core::{
    ChatEvent, Conversation, ConversationId, ConversationStore, EngineError, FetchRequest,
    FetchResponse, ParticipantId, StoreConfig, StoreSignal, TypingTracker,
};

use crate::{
    channel::{command_channel, update_channel, ChannelError, CommandSender, UpdateStream},
    config::RuntimeConfig,
    transport::{ChatTransport, CreateRequest},
};

/// Command accepted by the engine runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Refresh the active list with silent-clear semantics.
    Refresh,
    /// Load the next active page when the trigger position allows it.
    LoadMore {
        /// Conversation the UI scrolled to.
        current_id: ConversationId,
    },
    /// Fetch the next archived page.
    FetchArchived,
    /// Request a pin.
    Pin(ConversationId),
    /// Request an unpin.
    Unpin(ConversationId),
    /// Request a mute.
    Mute(ConversationId),
    /// Request an unmute.
    Unmute(ConversationId),
    /// Request an archive.
    Archive(ConversationId),
    /// Request an unarchive.
    Unarchive(ConversationId),
    /// Request a delete.
    Delete(ConversationId),
    /// Leave a thread.
    Leave(ConversationId),
    /// Clear thread history server-side.
    ClearHistory(ConversationId),
    /// Report a thread as spam.
    Spam(ConversationId),
    /// Create a new thread.
    Create(CreateRequest),
    /// Add participants to a thread.
    AddParticipants {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Contacts to add.
        contact_ids: Vec<i64>,
    },
}

/// Update broadcast to UI subscribers after each reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineUpdate {
    /// Snapshot of both ordered partitions.
    ListChanged {
        /// Active partition in display order.
        active: Vec<Conversation>,
        /// Archived partition in display order.
        archived: Vec<Conversation>,
    },
    /// The local user joined a thread the UI should open.
    ShowThread(ConversationId),
    /// A typing indicator turned on or off.
    TypingChanged {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Typing participant while showing.
        participant_id: Option<ParticipantId>,
        /// Whether the indicator is now visible.
        showing: bool,
    },
}

/// Handle to a running engine.
#[derive(Debug)]
pub struct EngineHandle {
    commands: CommandSender,
    update_tx: broadcast::Sender<EngineUpdate>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Subscribe to engine updates.
    pub fn subscribe(&self) -> UpdateStream {
        self.update_tx.subscribe()
    }

    /// Send one command to the runtime.
    pub async fn send(&self, command: EngineCommand) -> Result<(), ChannelError> {
        self.commands.send(command).await
    }

    /// Stop the runtime and wait for the actor task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the single-writer engine actor.
///
/// All list state lives inside the spawned task; commands, transport
/// events, and fetch results are serialized through its `select!` loop, so
/// no concurrent callback ever touches the collection directly.
pub fn spawn_engine<T>(
    transport: Arc<T>,
    local_user_id: ParticipantId,
    config: RuntimeConfig,
) -> EngineHandle
where
    T: ChatTransport + 'static,
{
    let (commands, command_rx) = command_channel(config.command_buffer);
    let update_tx = update_channel(config.update_buffer);
    let cancel = CancellationToken::new();
    // Subscribe before spawning so events pushed right after this call are
    // never missed.
    let events = transport.events();
    let runtime = EngineRuntime::new(transport, local_user_id, config, update_tx.clone());
    let task = tokio::spawn(runtime.run(command_rx, events, cancel.child_token()));

    EngineHandle {
        commands,
        update_tx,
        cancel,
        task,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActionKind {
    Pin,
    Unpin,
    Mute,
    Unmute,
    Archive,
    Unarchive,
    Delete,
    Leave,
    ClearHistory,
    Spam,
}

/// Bookkeeping for mutation intents awaiting their confirmation event.
///
/// Expiry releases only this bookkeeping; no state is rolled back because
/// none was applied optimistically.
#[derive(Debug, Default)]
struct PendingActions {
    deadlines: HashMap<(ActionKind, ConversationId), u64>,
}

impl PendingActions {
    fn record(&mut self, kind: ActionKind, id: ConversationId, deadline_ms: u64) {
        self.deadlines.insert((kind, id), deadline_ms);
    }

    fn confirm(&mut self, event: &ChatEvent) {
        let key = match event {
            ChatEvent::Pin { conversation_id } => (ActionKind::Pin, *conversation_id),
            ChatEvent::Unpin { conversation_id } => (ActionKind::Unpin, *conversation_id),
            ChatEvent::Mute { conversation_id } => (ActionKind::Mute, *conversation_id),
            ChatEvent::Unmute { conversation_id } => (ActionKind::Unmute, *conversation_id),
            ChatEvent::Archive { conversation_id } => (ActionKind::Archive, *conversation_id),
            ChatEvent::Unarchive { conversation_id } => (ActionKind::Unarchive, *conversation_id),
            ChatEvent::Deleted { conversation_id } => (ActionKind::Delete, *conversation_id),
            ChatEvent::Left { conversation_id } => (ActionKind::Leave, *conversation_id),
            ChatEvent::Spammed { conversation_id } => (ActionKind::Spam, *conversation_id),
            ChatEvent::UnreadCountChanged {
                conversation_id,
                count: 0,
            } => (ActionKind::ClearHistory, *conversation_id),
            _ => return,
        };
        self.deadlines.remove(&key);
    }

    fn sweep(&mut self, now_ms: u64) -> Vec<(ActionKind, ConversationId)> {
        let expired: Vec<_> = self
            .deadlines
            .iter()
            .filter(|(_, &deadline)| now_ms > deadline)
            .map(|(&key, _)| key)
            .collect();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchPurpose {
    Page { archived: bool },
    Single(ConversationId),
}

#[derive(Debug)]
struct FetchArrival {
    ticket: Uuid,
    purpose: FetchPurpose,
    result: Result<FetchResponse, EngineError>,
}

struct EngineRuntime<T> {
    transport: Arc<T>,
    store: ConversationStore,
    typing: TypingTracker,
    pending: PendingActions,
    config: RuntimeConfig,
    update_tx: broadcast::Sender<EngineUpdate>,
    fetch_tx: mpsc::Sender<FetchArrival>,
    fetch_rx: mpsc::Receiver<FetchArrival>,
    active_page_fetch: Option<Uuid>,
    archived_page_fetch: Option<Uuid>,
}

impl<T> EngineRuntime<T>
where
    T: ChatTransport + 'static,
{
    fn new(
        transport: Arc<T>,
        local_user_id: ParticipantId,
        config: RuntimeConfig,
        update_tx: broadcast::Sender<EngineUpdate>,
    ) -> Self {
        let store = ConversationStore::new(
            local_user_id,
            StoreConfig {
                page_size: config.page_size,
                threshold_window: config.threshold_window,
            },
        );
        let (fetch_tx, fetch_rx) = mpsc::channel(16);

        Self {
            transport,
            store,
            typing: TypingTracker::new(),
            pending: PendingActions::default(),
            config,
            update_tx,
            fetch_tx,
            fetch_rx,
            active_page_fetch: None,
            archived_page_fetch: None,
        }
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<EngineCommand>,
        mut events: broadcast::Receiver<ChatEvent>,
        cancel: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("engine runtime started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    trace!(?command, "handling engine command");
                    self.handle_command(command);
                }
                arrival = self.fetch_rx.recv() => {
                    if let Some(arrival) = arrival {
                        self.handle_fetch_arrival(arrival);
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_transport_event(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event feed lagged; refreshing to reconcile");
                            self.start_refresh();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tick.tick() => self.on_tick(),
            }
        }
        debug!("engine runtime exiting");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Refresh => self.start_refresh(),
            EngineCommand::LoadMore { current_id } => {
                if !self.store.can_load_more(current_id) {
                    debug!(conversation_id = current_id, "load-more suppressed");
                    return;
                }
                let request = self.store.prepare_for_load_more();
                self.dispatch_fetch(request, FetchPurpose::Page { archived: false });
            }
            EngineCommand::FetchArchived => {
                let request = self.store.prepare_archived_fetch();
                self.dispatch_fetch(request, FetchPurpose::Page { archived: true });
            }
            EngineCommand::Pin(id) => self.dispatch_action(ActionKind::Pin, id),
            EngineCommand::Unpin(id) => self.dispatch_action(ActionKind::Unpin, id),
            EngineCommand::Mute(id) => self.dispatch_action(ActionKind::Mute, id),
            EngineCommand::Unmute(id) => self.dispatch_action(ActionKind::Unmute, id),
            EngineCommand::Archive(id) => self.dispatch_action(ActionKind::Archive, id),
            EngineCommand::Unarchive(id) => self.dispatch_action(ActionKind::Unarchive, id),
            EngineCommand::Delete(id) => self.dispatch_action(ActionKind::Delete, id),
            EngineCommand::Leave(id) => self.dispatch_action(ActionKind::Leave, id),
            EngineCommand::ClearHistory(id) => self.dispatch_action(ActionKind::ClearHistory, id),
            EngineCommand::Spam(id) => self.dispatch_action(ActionKind::Spam, id),
            EngineCommand::Create(request) => {
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    if let Err(err) = transport.create(request).await {
                        warn!(error = %err, "create intent failed");
                    }
                });
            }
            EngineCommand::AddParticipants {
                conversation_id,
                contact_ids,
            } => {
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    if let Err(err) = transport
                        .add_participants(conversation_id, contact_ids)
                        .await
                    {
                        warn!(conversation_id, error = %err, "add-participants intent failed");
                    }
                });
            }
        }
    }

    fn start_refresh(&mut self) {
        let request = self.store.begin_refresh();
        self.dispatch_fetch(request, FetchPurpose::Page { archived: false });
    }

    fn dispatch_fetch(&mut self, request: FetchRequest, purpose: FetchPurpose) {
        let ticket = Uuid::new_v4();
        if let FetchPurpose::Page { archived } = purpose {
            let slot = if archived {
                &mut self.archived_page_fetch
            } else {
                &mut self.active_page_fetch
            };
            if let Some(previous) = slot.replace(ticket) {
                debug!(previous = %previous, archived, "superseding in-flight page fetch");
            }
        }

        let transport = Arc::clone(&self.transport);
        let fetch_tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = transport.fetch_conversations(request).await;
            let _ = fetch_tx
                .send(FetchArrival {
                    ticket,
                    purpose,
                    result,
                })
                .await;
        });
    }

    fn dispatch_action(&mut self, kind: ActionKind, id: ConversationId) {
        let deadline = now_millis() + self.config.action_timeout_ms;
        self.pending.record(kind, id, deadline);

        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = match kind {
                ActionKind::Pin => transport.pin(id).await,
                ActionKind::Unpin => transport.unpin(id).await,
                ActionKind::Mute => transport.mute(id).await,
                ActionKind::Unmute => transport.unmute(id).await,
                ActionKind::Archive => transport.archive(id).await,
                ActionKind::Unarchive => transport.unarchive(id).await,
                ActionKind::Delete => transport.delete(id).await,
                ActionKind::Leave => transport.leave(id).await,
                ActionKind::ClearHistory => transport.clear_history(id).await,
                ActionKind::Spam => transport.spam(id).await,
            };
            if let Err(err) = result {
                warn!(conversation_id = id, error = %err, "mutation intent failed");
            }
        });
    }

    fn handle_fetch_arrival(&mut self, arrival: FetchArrival) {
        match arrival.purpose {
            FetchPurpose::Page { archived } => {
                // Generation check, per partition: only the most recent
                // fetch counts. A stale response here means a newer fetch
                // for the same partition owns the loading flag (or already
                // released it), so dropping the response leaves no cursor
                // stranded.
                let slot = if archived {
                    &mut self.archived_page_fetch
                } else {
                    &mut self.active_page_fetch
                };
                if *slot != Some(arrival.ticket) {
                    debug!(ticket = %arrival.ticket, archived, "discarding stale page response");
                    return;
                }
                *slot = None;
                match arrival.result {
                    Ok(response) => {
                        let signals = self.store.apply_page(&response, archived);
                        self.publish(signals);
                    }
                    Err(err) => {
                        warn!(error = %err, archived, "page fetch failed; leaving state untouched");
                        self.store.abort_load(archived);
                    }
                }
            }
            FetchPurpose::Single(id) => match arrival.result {
                Ok(response) => {
                    let signals = self.store.apply_missed(&response);
                    self.publish(signals);
                }
                Err(err) => {
                    debug!(conversation_id = id, error = %err, "single fetch failed; dropped");
                }
            },
        }
    }

    fn handle_transport_event(&mut self, event: ChatEvent) {
        if let ChatEvent::Typing {
            conversation_id,
            participant_id,
        } = event
        {
            if self.typing.record(conversation_id, participant_id, now_millis()) {
                self.send_update(EngineUpdate::TypingChanged {
                    conversation_id,
                    participant_id: Some(participant_id),
                    showing: true,
                });
            }
            return;
        }

        self.pending.confirm(&event);
        match &event {
            ChatEvent::Deleted { conversation_id }
            | ChatEvent::Left { conversation_id }
            | ChatEvent::Spammed { conversation_id } => self.typing.clear(*conversation_id),
            ChatEvent::UserRemoved {
                conversation_id,
                participant_id,
            } if *participant_id == self.store.local_user_id() => {
                // Removes the conversation below; drop its indicator too.
                self.typing.clear(*conversation_id);
            }
            _ => {}
        }
        let signals = self.store.apply_event(&event);
        self.publish(signals);
    }

    fn on_tick(&mut self) {
        let now = now_millis();
        for conversation_id in self.typing.sweep(now, self.config.typing_expiry_ms) {
            self.send_update(EngineUpdate::TypingChanged {
                conversation_id,
                participant_id: None,
                showing: false,
            });
        }
        for (kind, id) in self.pending.sweep(now) {
            warn!(
                ?kind,
                conversation_id = id,
                "mutation confirmation timed out; releasing pending bookkeeping"
            );
        }
    }

    fn publish(&mut self, signals: Vec<StoreSignal>) {
        for signal in signals {
            match signal {
                StoreSignal::ListChanged => {
                    let update = EngineUpdate::ListChanged {
                        active: self.store.active().items().to_vec(),
                        archived: self.store.archived().items().to_vec(),
                    };
                    self.send_update(update);
                }
                StoreSignal::ShowThread(id) => self.send_update(EngineUpdate::ShowThread(id)),
                StoreSignal::FetchConversation(id) => {
                    self.dispatch_fetch(FetchRequest::single(id), FetchPurpose::Single(id));
                }
            }
        }
    }

    fn send_update(&self, update: EngineUpdate) {
        // No subscribers is fine; updates are best-effort notifications.
        let _ = self.update_tx.send(update);
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use threadlist_core::ConversationKind;
    use tokio::time::timeout;

    const LOCAL_USER: ParticipantId = 1000;
    const RECV_TIMEOUT: Duration = Duration::from_millis(2_000);

    fn conversation(id: ConversationId, time: u64, pinned: bool) -> Conversation {
        Conversation {
            id,
            title: format!("thread-{id}"),
            time,
            pinned,
            ..Conversation::default()
        }
    }

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            tick_interval_ms: 20,
            typing_expiry_ms: 40,
            ..RuntimeConfig::default()
        }
    }

    async fn next_list_changed(updates: &mut UpdateStream) -> Vec<Conversation> {
        loop {
            let update = timeout(RECV_TIMEOUT, updates.recv())
                .await
                .expect("update should arrive in time")
                .expect("update stream should stay open");
            if let EngineUpdate::ListChanged { active, .. } = update {
                return active;
            }
        }
    }

    async fn next_typing(updates: &mut UpdateStream) -> (ConversationId, bool) {
        loop {
            let update = timeout(RECV_TIMEOUT, updates.recv())
                .await
                .expect("update should arrive in time")
                .expect("update stream should stay open");
            if let EngineUpdate::TypingChanged {
                conversation_id,
                showing,
                ..
            } = update
            {
                return (conversation_id, showing);
            }
        }
    }

    /// Delays active-partition fetches at one offset so tests can overlap
    /// page fetches deterministically.
    struct SlowPageTransport {
        inner: InMemoryTransport,
        slow_offset: usize,
        delay: Duration,
    }

    #[async_trait]
    impl ChatTransport for SlowPageTransport {
        async fn fetch_conversations(
            &self,
            request: FetchRequest,
        ) -> Result<FetchResponse, EngineError> {
            if !request.archived && request.thread_ids.is_none() && request.offset == self.slow_offset
            {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.fetch_conversations(request).await
        }

        async fn pin(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.pin(id).await
        }
        async fn unpin(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.unpin(id).await
        }
        async fn mute(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.mute(id).await
        }
        async fn unmute(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.unmute(id).await
        }
        async fn archive(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.archive(id).await
        }
        async fn unarchive(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.unarchive(id).await
        }
        async fn delete(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.delete(id).await
        }
        async fn leave(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.leave(id).await
        }
        async fn clear_history(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.clear_history(id).await
        }
        async fn spam(&self, id: ConversationId) -> Result<(), EngineError> {
            self.inner.spam(id).await
        }
        async fn create(&self, request: CreateRequest) -> Result<Conversation, EngineError> {
            self.inner.create(request).await
        }
        async fn add_participants(
            &self,
            id: ConversationId,
            contact_ids: Vec<i64>,
        ) -> Result<(), EngineError> {
            self.inner.add_participants(id, contact_ids).await
        }

        fn events(&self) -> broadcast::Receiver<ChatEvent> {
            self.inner.events()
        }
    }

    fn eight_threads() -> Vec<Conversation> {
        (1..=8)
            .map(|id| conversation(id, 1_000 - id as u64, false))
            .collect()
    }

    #[tokio::test]
    async fn refresh_publishes_pin_aware_snapshot() {
        let transport = Arc::new(InMemoryTransport::new(vec![
            conversation(1, 100, false),
            conversation(2, 50, true),
        ]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        handle
            .send(EngineCommand::Refresh)
            .await
            .expect("send should work");

        let active = next_list_changed(&mut updates).await;
        let ids: Vec<_> = active.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn pin_intent_applies_only_after_confirmation_event() {
        let transport = Arc::new(InMemoryTransport::new(vec![
            conversation(1, 100, false),
            conversation(2, 50, true),
        ]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        handle.send(EngineCommand::Refresh).await.expect("send");
        next_list_changed(&mut updates).await;

        handle.send(EngineCommand::Pin(1)).await.expect("send");
        let active = next_list_changed(&mut updates).await;
        let ids: Vec<_> = active.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(active[0].pinned);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn archive_moves_between_partition_snapshots() {
        let transport = Arc::new(InMemoryTransport::new(vec![
            conversation(1, 100, false),
            conversation(2, 50, false),
        ]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        handle.send(EngineCommand::Refresh).await.expect("send");
        next_list_changed(&mut updates).await;

        handle.send(EngineCommand::Archive(2)).await.expect("send");
        loop {
            let update = timeout(RECV_TIMEOUT, updates.recv())
                .await
                .expect("update should arrive in time")
                .expect("update stream should stay open");
            if let EngineUpdate::ListChanged { active, archived } = update {
                if archived.iter().any(|c| c.id == 2) {
                    assert!(!active.iter().any(|c| c.id == 2));
                    assert!(archived[0].archived);
                    break;
                }
            }
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn typing_indicator_shows_and_expires() {
        let transport = Arc::new(InMemoryTransport::new(vec![conversation(1, 100, false)]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        transport.push_event(ChatEvent::Typing {
            conversation_id: 1,
            participant_id: 2001,
        });

        assert_eq!(next_typing(&mut updates).await, (1, true));
        assert_eq!(next_typing(&mut updates).await, (1, false));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn new_message_on_unknown_thread_is_backfilled() {
        let transport = Arc::new(InMemoryTransport::new(vec![conversation(42, 500, false)]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        // No refresh happened, so conversation 42 is locally unknown; the
        // push triggers a single-conversation fetch against the transport.
        transport.push_event(ChatEvent::NewMessage {
            conversation_id: 42,
            message: threadlist_core::MessageSummary {
                id: 7,
                text: "hi".to_owned(),
                sender_id: 2001,
                time: 600,
            },
        });

        let active = next_list_changed(&mut updates).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 42);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn created_event_surfaces_new_thread() {
        let transport = Arc::new(InMemoryTransport::new(vec![conversation(1, 100, false)]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        handle
            .send(EngineCommand::Create(CreateRequest {
                title: "fresh".to_owned(),
                kind: ConversationKind::Group,
                participant_ids: vec![2001],
            }))
            .await
            .expect("send");

        let active = next_list_changed(&mut updates).await;
        assert!(active.iter().any(|c| c.title == "fresh"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn archived_fetch_leaves_active_load_more_in_flight() {
        let transport = Arc::new(SlowPageTransport {
            inner: InMemoryTransport::new(eight_threads()),
            slow_offset: 6,
            delay: Duration::from_millis(100),
        });
        let config = RuntimeConfig {
            page_size: 6,
            ..fast_config()
        };
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, config);
        let mut updates = handle.subscribe();

        handle.send(EngineCommand::Refresh).await.expect("send");
        assert_eq!(next_list_changed(&mut updates).await.len(), 6);

        // The archived fetch completes while the second active page is
        // still in flight; it must not displace that fetch.
        handle
            .send(EngineCommand::LoadMore { current_id: 6 })
            .await
            .expect("send");
        handle.send(EngineCommand::FetchArchived).await.expect("send");

        loop {
            let active = next_list_changed(&mut updates).await;
            if active.len() == 8 {
                break;
            }
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn superseded_load_more_is_discarded_and_pagination_recovers() {
        let transport = Arc::new(SlowPageTransport {
            inner: InMemoryTransport::new(eight_threads()),
            slow_offset: 6,
            delay: Duration::from_millis(100),
        });
        let config = RuntimeConfig {
            page_size: 6,
            ..fast_config()
        };
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, config);
        let mut updates = handle.subscribe();

        handle.send(EngineCommand::Refresh).await.expect("send");
        assert_eq!(next_list_changed(&mut updates).await.len(), 6);

        // Refresh replaces the slow load-more; its late response must be
        // dropped instead of appending page-two items to the fresh list.
        handle
            .send(EngineCommand::LoadMore { current_id: 6 })
            .await
            .expect("send");
        handle.send(EngineCommand::Refresh).await.expect("send");
        assert_eq!(next_list_changed(&mut updates).await.len(), 6);

        tokio::time::sleep(Duration::from_millis(250)).await;
        while let Ok(update) = updates.try_recv() {
            if let EngineUpdate::ListChanged { active, .. } = update {
                assert_eq!(active.len(), 6, "stale page response must be discarded");
            }
        }

        // The discarded fetch must not wedge pagination.
        handle
            .send(EngineCommand::LoadMore { current_id: 6 })
            .await
            .expect("send");
        loop {
            let active = next_list_changed(&mut updates).await;
            if active.len() == 8 {
                break;
            }
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn typing_indicator_clears_when_local_user_is_removed() {
        let transport = Arc::new(InMemoryTransport::new(vec![conversation(1, 100, false)]));
        let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, fast_config());
        let mut updates = handle.subscribe();

        handle.send(EngineCommand::Refresh).await.expect("send");
        next_list_changed(&mut updates).await;

        transport.push_event(ChatEvent::Typing {
            conversation_id: 1,
            participant_id: 2001,
        });
        assert_eq!(next_typing(&mut updates).await, (1, true));

        transport.push_event(ChatEvent::UserRemoved {
            conversation_id: 1,
            participant_id: LOCAL_USER,
        });
        let active = next_list_changed(&mut updates).await;
        assert!(active.is_empty());

        // The indicator went with the conversation; the expiry sweep has
        // nothing left to report.
        let expiry = timeout(Duration::from_millis(200), next_typing(&mut updates)).await;
        assert!(expiry.is_err(), "no expiry update for a removed conversation");
        handle.shutdown().await;
    }

    #[test]
    fn pending_actions_confirm_and_expire() {
        let mut pending = PendingActions::default();
        pending.record(ActionKind::Pin, 1, 1_000);
        pending.record(ActionKind::Mute, 2, 2_000);

        pending.confirm(&ChatEvent::Pin { conversation_id: 1 });
        assert_eq!(pending.sweep(1_500), vec![]);

        let expired = pending.sweep(2_500);
        assert_eq!(expired, vec![(ActionKind::Mute, 2)]);
        assert!(pending.sweep(3_000).is_empty());
    }
}
