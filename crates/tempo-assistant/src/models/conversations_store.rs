use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::debug;

use tempo_client::types::{AssistantMode, ConversationRecord};

use super::autosave_scheduler::AutoSaveScheduler;
use super::conversation::{Conversation, Message};

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Changes published by the store. Subscribers re-derive their views;
/// events are emitted after the mutation has been applied, preserving
/// update order.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    ConversationAdded { conversation_id: String },
    MessageAppended { conversation_id: String },
    MessageRetracted { conversation_id: String },
    ActiveChanged { conversation_id: Option<String> },
    ConversationRemoved { conversation_id: String },
    RemoteMerged { added: usize, replaced: usize },
}

/// Single source of truth for all loaded conversations and the active one.
///
/// All mutation goes through these methods; no component reaches into the
/// map directly. The store owns the auto-save scheduler, so every accepted
/// mutation restarts the debounce and every switch flushes the previous
/// conversation's pending save.
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    active_id: Option<String>,
    autosave: AutoSaveScheduler,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    pub fn new(autosave: AutoSaveScheduler) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            conversations: HashMap::new(),
            active_id: None,
            autosave,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine; views attach lazily.
        let _ = self.events.send(event);
    }

    /// Create a new conversation and make it active. Returns its id without
    /// contacting the backend; persistence starts with the first message.
    pub fn create(&mut self, mode: AssistantMode) -> String {
        let conversation = Conversation::new(mode);
        let id = conversation.id().to_string();
        self.conversations.insert(id.clone(), conversation);
        debug!(conversation_id = %id, mode = mode.as_str(), "conversation created");
        self.emit(StoreEvent::ConversationAdded {
            conversation_id: id.clone(),
        });
        self.activate(Some(id.clone()));
        id
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Append a message in arrival order, refresh `updated_at` and restart
    /// the auto-save debounce with the new full snapshot. Returns false for
    /// an unknown conversation.
    pub fn append(&mut self, id: &str, message: Message) -> bool {
        let Some(conversation) = self.conversations.get_mut(id) else {
            return false;
        };
        conversation.push_message(message);
        self.autosave.schedule(conversation.clone());
        self.emit(StoreEvent::MessageAppended {
            conversation_id: id.to_string(),
        });
        true
    }

    /// Roll back the newest message (rejected optimistic append). The
    /// auto-save snapshot is corrected so the retracted message can never be
    /// persisted; a conversation rolled back to empty has nothing worth
    /// saving and its pending work is dropped.
    pub fn pop_message(&mut self, id: &str) -> Option<Message> {
        let conversation = self.conversations.get_mut(id)?;
        let message = conversation.pop_message()?;
        if conversation.message_count() == 0 {
            self.autosave.cancel(id);
        } else {
            self.autosave.schedule(conversation.clone());
        }
        self.emit(StoreEvent::MessageRetracted {
            conversation_id: id.to_string(),
        });
        Some(message)
    }

    /// Switch the active conversation, flushing the previous one's pending
    /// save so no unsynced turn is lost. Returns false for an unknown id.
    pub fn switch_active(&mut self, id: &str) -> bool {
        if !self.conversations.contains_key(id) {
            return false;
        }
        if self.active_id.as_deref() == Some(id) {
            return true;
        }
        self.activate(Some(id.to_string()));
        true
    }

    fn activate(&mut self, id: Option<String>) {
        // Flush-on-switch: pending work for the outgoing conversation is
        // persisted immediately, not discarded.
        if let Some(previous) = self.active_id.take()
            && Some(previous.as_str()) != id.as_deref()
        {
            self.autosave.flush(&previous);
        }
        self.active_id = id.clone();
        self.emit(StoreEvent::ActiveChanged {
            conversation_id: id,
        });
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id
            .as_deref()
            .and_then(|id| self.conversations.get(id))
    }

    /// Optimistic local removal. Cancels pending auto-save work; if the
    /// active conversation is removed, active becomes none.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.conversations.remove(id).is_some();
        if !removed {
            return false;
        }
        self.autosave.cancel(id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
            self.emit(StoreEvent::ActiveChanged {
                conversation_id: None,
            });
        }
        debug!(conversation_id = %id, "conversation removed");
        self.emit(StoreEvent::ConversationRemoved {
            conversation_id: id.to_string(),
        });
        true
    }

    /// Merge a remote conversation list into the local cache: remote-only
    /// conversations are added, conversations present in both keep whichever
    /// version has the later `updated_at` (local wins ties — the active
    /// conversation is the one being edited), and local-only conversations
    /// are kept. Returns `(added, replaced)`.
    pub fn merge_remote(&mut self, records: Vec<ConversationRecord>) -> (usize, usize) {
        let mut added = 0;
        let mut replaced = 0;

        for record in records {
            let remote = Conversation::from_record(record);
            let id = remote.id().to_string();
            match self.conversations.get(&id).map(|local| local.updated_at()) {
                None => {
                    self.conversations.insert(id, remote);
                    added += 1;
                }
                Some(local_updated) if remote.updated_at() > local_updated => {
                    // The remote copy supersedes any stale pending save.
                    self.autosave.cancel(&id);
                    self.conversations.insert(id, remote);
                    replaced += 1;
                }
                Some(_) => {}
            }
        }

        debug!(added, replaced, total = self.conversations.len(), "remote list merged");
        self.emit(StoreEvent::RemoteMerged { added, replaced });
        (added, replaced)
    }

    /// All conversations, most-recently-updated first.
    pub fn list(&self) -> Vec<&Conversation> {
        let mut conversations: Vec<&Conversation> = self.conversations.values().collect();
        conversations.sort_by_key(|c| std::cmp::Reverse(c.updated_at()));
        conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Flush every pending save (view unload).
    pub fn flush_pending(&self) {
        self.autosave.flush_all();
    }

    /// True while the conversation has unsynced state.
    pub fn has_unsaved(&self, id: &str) -> bool {
        self.autosave.has_unsaved(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use parking_lot::Mutex;

    use tempo_client::ApiResult;
    use tempo_client::types::Role;

    use super::*;
    use crate::models::autosave_scheduler::ConversationSaver;

    struct RecordingSaver {
        saves: Mutex<Vec<Conversation>>,
    }

    impl RecordingSaver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                saves: Mutex::new(Vec::new()),
            })
        }

        fn saved(&self) -> Vec<Conversation> {
            self.saves.lock().clone()
        }
    }

    impl ConversationSaver for RecordingSaver {
        fn save(&self, snapshot: Conversation) -> BoxFuture<'static, ApiResult<()>> {
            self.saves.lock().push(snapshot);
            Box::pin(async { Ok(()) })
        }
    }

    fn store_with_saver() -> (ConversationStore, Arc<RecordingSaver>) {
        let saver = RecordingSaver::new();
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), Duration::from_secs(60));
        (ConversationStore::new(scheduler), saver)
    }

    #[tokio::test]
    async fn test_create_sets_active() {
        let (mut store, _saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);
        assert_eq!(store.active_id(), Some(id.as_str()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_append_preserves_submission_order() {
        let (mut store, _saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);

        store.append(&id, Message::user("one"));
        store.append(&id, Message::assistant("two"));
        store.append(&id, Message::user("three"));

        let conversation = store.get(&id).unwrap();
        let order: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(order, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_is_rejected() {
        let (mut store, _saver) = store_with_saver();
        assert!(!store.append("missing", Message::user("hello")));
    }

    #[tokio::test]
    async fn test_switch_flushes_previous_conversation() {
        let (mut store, saver) = store_with_saver();
        let first = store.create(AssistantMode::Chat);
        store.append(&first, Message::user("unsynced turn"));
        assert!(store.has_unsaved(&first));

        let second = store.create(AssistantMode::Chat);
        assert_eq!(store.active_id(), Some(second.as_str()));

        // Flush-on-switch saved the first conversation immediately.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let saves = saver.saved();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].id(), first);
        assert_eq!(saves[0].messages()[0].content, "unsynced turn");
    }

    #[tokio::test]
    async fn test_remove_active_clears_active() {
        let (mut store, _saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);
        assert!(store.remove(&id));
        assert_eq!(store.active_id(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_pop_message_on_empty_conversation_drops_pending_save() {
        let (mut store, saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);
        store.append(&id, Message::user("doomed"));

        let popped = store.pop_message(&id).unwrap();
        assert_eq!(popped.role, Role::User);
        assert!(!store.has_unsaved(&id));

        store.flush_pending();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(saver.saved().is_empty(), "empty conversation is never saved");
    }

    #[tokio::test]
    async fn test_merge_adds_remote_only_conversations() {
        let (mut store, _saver) = store_with_saver();
        let remote = Conversation::new(AssistantMode::Chat).to_record();

        let (added, replaced) = store.merge_remote(vec![remote.clone()]);
        assert_eq!((added, replaced), (1, 0));
        assert!(store.get(&remote.id).is_some());
    }

    #[tokio::test]
    async fn test_merge_prefers_later_updated_at() {
        let (mut store, _saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);
        store.append(&id, Message::user("local edit"));

        // Remote copy with an older updated_at must not clobber local state.
        let mut stale = store.get(&id).unwrap().to_record();
        stale.title = "stale remote".to_string();
        stale.updated_at -= 10_000;
        let (added, replaced) = store.merge_remote(vec![stale]);
        assert_eq!((added, replaced), (0, 0));
        assert_eq!(store.get(&id).unwrap().messages().len(), 1);

        // A newer remote copy replaces the local one.
        let mut newer = store.get(&id).unwrap().to_record();
        newer.title = "edited elsewhere".to_string();
        newer.updated_at += 10_000;
        let (added, replaced) = store.merge_remote(vec![newer]);
        assert_eq!((added, replaced), (0, 1));
        assert_eq!(store.get(&id).unwrap().title(), "edited elsewhere");
    }

    #[tokio::test]
    async fn test_merge_keeps_local_on_tie() {
        let (mut store, _saver) = store_with_saver();
        let id = store.create(AssistantMode::Chat);
        store.append(&id, Message::user("mine"));

        let mut tied = store.get(&id).unwrap().to_record();
        tied.title = "theirs".to_string();
        let (_, replaced) = store.merge_remote(vec![tied]);
        assert_eq!(replaced, 0);
        assert_eq!(store.get(&id).unwrap().title(), "mine");
    }

    #[tokio::test]
    async fn test_list_orders_by_updated_at_descending() {
        let (mut store, _saver) = store_with_saver();
        let older = store.create(AssistantMode::Chat);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = store.create(AssistantMode::Chat);
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.append(&newer, Message::user("touch"));

        let listed: Vec<&str> = store.list().iter().map(|c| c.id()).collect();
        assert_eq!(listed, vec![newer.as_str(), older.as_str()]);
    }

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let (mut store, _saver) = store_with_saver();
        let mut events = store.subscribe();

        let id = store.create(AssistantMode::Chat);
        store.append(&id, Message::user("hello"));

        assert!(matches!(
            events.try_recv().unwrap(),
            StoreEvent::ConversationAdded { .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            StoreEvent::ActiveChanged { .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            StoreEvent::MessageAppended { .. }
        ));
    }
}
