use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Shown inline at the conversation the failed turn belongs to.
    InlineError,
    /// Transient app-level notification.
    Toast,
    /// Credits are exhausted; show the upgrade call-to-action.
    UpgradePrompt,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub conversation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// User-visible notification channel: bounded FIFO retention plus a
/// broadcast of every pushed notice for live subscribers.
pub struct NoticeStore {
    entries: Mutex<Vec<Notice>>,
    max_entries: usize,
    events: broadcast::Sender<Notice>,
}

impl NoticeStore {
    pub fn new(max_entries: usize) -> Self {
        let (events, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
            events,
        }
    }

    pub fn push(
        &self,
        kind: NoticeKind,
        message: impl Into<String>,
        conversation_id: Option<String>,
    ) {
        let notice = Notice {
            kind,
            message: message.into(),
            conversation_id,
            timestamp: Utc::now(),
        };

        {
            let mut entries = self.entries.lock();
            entries.push(notice.clone());
            // FIFO eviction when exceeding max
            if entries.len() > self.max_entries {
                entries.remove(0);
            }
        }

        let _ = self.events.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.events.subscribe()
    }

    pub fn entries(&self) -> Vec<Notice> {
        self.entries.lock().clone()
    }

    pub fn count_of(&self, kind: NoticeKind) -> usize {
        self.entries.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for NoticeStore {
    fn default() -> Self {
        Self::new(100)
    }
}
