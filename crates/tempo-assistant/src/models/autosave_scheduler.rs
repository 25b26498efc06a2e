use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tempo_client::ApiResult;

use super::conversation::Conversation;

/// Debounce window between the last accepted mutation and the save request.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Performs the actual full-replace upsert for a conversation snapshot.
pub trait ConversationSaver: Send + Sync + 'static {
    fn save(&self, snapshot: Conversation) -> BoxFuture<'static, ApiResult<()>>;
}

#[derive(Default)]
struct Slot {
    /// Latest full snapshot waiting to be persisted.
    pending: Option<Conversation>,
    /// A save request is currently on the wire for this conversation.
    in_flight: bool,
    /// A flush arrived while a save was in flight; persist the pending
    /// snapshot immediately on completion instead of re-debouncing.
    flush_requested: bool,
    timer: Option<JoinHandle<()>>,
}

/// Debounced, cancellable persistence trigger.
///
/// Every accepted mutation restarts the debounce timer with a full snapshot
/// (full-replace semantics, immune to lost-update from partial patches). At
/// most one save per conversation is in flight; a timer firing during an
/// in-flight save defers, and completion re-debounces for whatever snapshot
/// arrived in the meantime, so the backend never observes an older
/// full-replace overwrite a newer one.
#[derive(Clone)]
pub struct AutoSaveScheduler {
    saver: Arc<dyn ConversationSaver>,
    delay: Duration,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl AutoSaveScheduler {
    pub fn new(saver: Arc<dyn ConversationSaver>) -> Self {
        Self::with_delay(saver, AUTOSAVE_DEBOUNCE)
    }

    /// Custom debounce window (test seam; production uses [`AUTOSAVE_DEBOUNCE`]).
    pub fn with_delay(saver: Arc<dyn ConversationSaver>, delay: Duration) -> Self {
        Self {
            saver,
            delay,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// (Re)start the debounce timer carrying the latest full snapshot.
    pub fn schedule(&self, snapshot: Conversation) {
        let id = snapshot.id().to_string();
        let mut slots = self.slots.lock();
        let slot = slots.entry(id.clone()).or_default();
        slot.pending = Some(snapshot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.timer = Some(self.start_timer(id));
    }

    /// Cancel the timer and persist any pending snapshot immediately. Used on
    /// conversation switch and view unload; pending work is flushed, never
    /// discarded.
    pub fn flush(&self, id: &str) {
        let snapshot = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(id) else {
                return;
            };
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            if slot.in_flight {
                // Completion will pick the pending snapshot up right away.
                slot.flush_requested = true;
                return;
            }
            let Some(snapshot) = slot.pending.take() else {
                return;
            };
            slot.in_flight = true;
            snapshot
        };

        debug!(conversation_id = %id, "flushing pending save");
        self.spawn_save(id.to_string(), snapshot);
    }

    /// Flush every conversation with pending work.
    pub fn flush_all(&self) {
        let ids: Vec<String> = self.slots.lock().keys().cloned().collect();
        for id in ids {
            self.flush(&id);
        }
    }

    /// Drop pending work for a deleted conversation. An already in-flight
    /// save is allowed to complete; deletion is idempotent by id.
    pub fn cancel(&self, id: &str) {
        let mut slots = self.slots.lock();
        if let Some(mut slot) = slots.remove(id) {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
    }

    /// True while the conversation has state not yet confirmed persisted.
    pub fn has_unsaved(&self, id: &str) -> bool {
        self.slots
            .lock()
            .get(id)
            .map(|slot| slot.pending.is_some() || slot.in_flight)
            .unwrap_or(false)
    }

    fn start_timer(&self, id: String) -> JoinHandle<()> {
        let this = self.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.timer_fired(&id);
        })
    }

    fn timer_fired(&self, id: &str) {
        let snapshot = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(id) else {
                return;
            };
            slot.timer = None;
            if slot.in_flight {
                // Coalesce: completion re-debounces for the pending snapshot.
                debug!(conversation_id = %id, "save in flight, deferring");
                return;
            }
            let Some(snapshot) = slot.pending.take() else {
                return;
            };
            slot.in_flight = true;
            snapshot
        };

        self.spawn_save(id.to_string(), snapshot);
    }

    fn spawn_save(&self, id: String, snapshot: Conversation) {
        let this = self.clone();
        tokio::spawn(async move {
            let retained = snapshot.clone();
            let result = this.saver.save(snapshot).await;

            let follow_up = {
                let mut slots = this.slots.lock();
                let Some(slot) = slots.get_mut(&id) else {
                    // Cancelled while the save was on the wire.
                    return;
                };
                slot.in_flight = false;

                match result {
                    Ok(()) => debug!(conversation_id = %id, "conversation saved"),
                    Err(error) => {
                        // Not surfaced: the next cycle sends the current full
                        // state and supersedes this attempt.
                        warn!(conversation_id = %id, error = %error, "auto-save failed");
                        if slot.pending.is_none() {
                            slot.pending = Some(retained);
                        }
                    }
                }

                if slot.pending.is_some() {
                    if slot.flush_requested {
                        slot.flush_requested = false;
                        slot.in_flight = true;
                        slot.pending.take()
                    } else {
                        if slot.timer.is_none() {
                            slot.timer = Some(this.start_timer(id.clone()));
                        }
                        None
                    }
                } else {
                    slot.flush_requested = false;
                    None
                }
            };

            if let Some(next) = follow_up {
                this.spawn_save(id, next);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempo_client::ApiError;
    use tempo_client::types::AssistantMode;

    use super::*;
    use crate::models::conversation::Message;

    const TEST_DELAY: Duration = Duration::from_millis(40);

    /// Saver that records every snapshot it is handed, with optional
    /// artificial latency and scripted failures.
    struct RecordingSaver {
        saves: Mutex<Vec<Conversation>>,
        latency: Duration,
        fail_first: AtomicUsize,
    }

    impl RecordingSaver {
        fn new() -> Arc<Self> {
            Self::with_latency(Duration::ZERO)
        }

        fn with_latency(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                saves: Mutex::new(Vec::new()),
                latency,
                fail_first: AtomicUsize::new(0),
            })
        }

        fn fail_next(&self, count: usize) {
            self.fail_first.store(count, Ordering::SeqCst);
        }

        fn saved(&self) -> Vec<Conversation> {
            self.saves.lock().clone()
        }
    }

    impl ConversationSaver for RecordingSaver {
        fn save(&self, snapshot: Conversation) -> BoxFuture<'static, ApiResult<()>> {
            let latency = self.latency;
            let should_fail = self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !should_fail {
                self.saves.lock().push(snapshot);
            }
            Box::pin(async move {
                if latency > Duration::ZERO {
                    tokio::time::sleep(latency).await;
                }
                if should_fail {
                    Err(ApiError::Status {
                        status: 500,
                        body: "boom".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
        }
    }

    fn conversation_with_messages(count: usize) -> Conversation {
        let mut conversation = Conversation::new(AssistantMode::Chat);
        for i in 0..count {
            conversation.push_message(Message::user(format!("message {i}")));
        }
        conversation
    }

    #[tokio::test]
    async fn test_mutations_within_window_coalesce_to_one_save() {
        let saver = RecordingSaver::new();
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), TEST_DELAY);

        let mut conversation = conversation_with_messages(1);
        let id = conversation.id().to_string();
        scheduler.schedule(conversation.clone());
        conversation.push_message(Message::user("second"));
        scheduler.schedule(conversation.clone());
        conversation.push_message(Message::user("third"));
        scheduler.schedule(conversation.clone());

        tokio::time::sleep(TEST_DELAY * 5).await;

        let saves = saver.saved();
        assert_eq!(saves.len(), 1, "three mutations in one window, one save");
        assert_eq!(saves[0].message_count(), 3, "save carries the last state");
        assert!(!scheduler.has_unsaved(&id));
    }

    #[tokio::test]
    async fn test_flush_persists_without_waiting_for_debounce() {
        let saver = RecordingSaver::new();
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), Duration::from_secs(60));

        let conversation = conversation_with_messages(2);
        let id = conversation.id().to_string();
        scheduler.schedule(conversation);
        assert!(scheduler.has_unsaved(&id));

        scheduler.flush(&id);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(saver.saved().len(), 1);
        assert!(!scheduler.has_unsaved(&id));
    }

    #[tokio::test]
    async fn test_mutation_during_in_flight_save_coalesces() {
        let saver = RecordingSaver::with_latency(Duration::from_millis(120));
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), TEST_DELAY);

        let mut conversation = conversation_with_messages(1);
        scheduler.schedule(conversation.clone());

        // Let the first save start, then mutate while it is on the wire.
        tokio::time::sleep(TEST_DELAY * 2).await;
        conversation.push_message(Message::user("while saving"));
        scheduler.schedule(conversation.clone());

        tokio::time::sleep(Duration::from_millis(400)).await;

        let saves = saver.saved();
        assert_eq!(saves.len(), 2, "second save after the first completes");
        assert_eq!(saves[1].message_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_is_retried_on_next_flush() {
        let saver = RecordingSaver::new();
        saver.fail_next(1);
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), TEST_DELAY);

        let conversation = conversation_with_messages(1);
        let id = conversation.id().to_string();
        scheduler.schedule(conversation);

        tokio::time::sleep(TEST_DELAY * 4).await;
        assert_eq!(saver.saved().len(), 0, "first attempt failed");
        assert!(scheduler.has_unsaved(&id), "failed snapshot is retained");

        scheduler.flush(&id);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(saver.saved().len(), 1);
        assert!(!scheduler.has_unsaved(&id));
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_work() {
        let saver = RecordingSaver::new();
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), TEST_DELAY);

        let conversation = conversation_with_messages(1);
        let id = conversation.id().to_string();
        scheduler.schedule(conversation);
        scheduler.cancel(&id);

        tokio::time::sleep(TEST_DELAY * 4).await;
        assert!(saver.saved().is_empty());
        assert!(!scheduler.has_unsaved(&id));
    }

    #[tokio::test]
    async fn test_flush_during_in_flight_save_runs_follow_up_immediately() {
        let saver = RecordingSaver::with_latency(Duration::from_millis(100));
        let scheduler = AutoSaveScheduler::with_delay(saver.clone(), TEST_DELAY);

        let mut conversation = conversation_with_messages(1);
        let id = conversation.id().to_string();
        scheduler.schedule(conversation.clone());
        tokio::time::sleep(TEST_DELAY * 2).await;

        // First save is on the wire; mutate and flush while it runs.
        conversation.push_message(Message::user("late"));
        scheduler.schedule(conversation.clone());
        scheduler.flush(&id);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let saves = saver.saved();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].message_count(), 2);
    }
}
