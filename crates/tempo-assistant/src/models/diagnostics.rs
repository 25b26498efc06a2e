use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::SystemTime;

use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// One captured WARN/ERROR event, with its structured fields flattened.
#[derive(Clone, Debug)]
pub struct DiagnosticEntry {
    pub timestamp: SystemTime,
    pub level: DiagnosticLevel,
    pub message: String,
    pub target: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub fields: HashMap<String, String>,
}

/// Bounded in-memory store of captured diagnostics. Fed from the
/// [`LogCollectorLayer`](crate::services::log_collector_layer::LogCollectorLayer)
/// channel; this is where persistence and background-refresh failures land
/// instead of being surfaced to the user.
pub struct DiagnosticsStore {
    entries: Mutex<Vec<DiagnosticEntry>>,
    max_entries: usize,
}

impl DiagnosticsStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: DiagnosticEntry) {
        let mut entries = self.entries.lock();
        entries.push(entry);

        // FIFO eviction when exceeding max
        if entries.len() > self.max_entries {
            entries.remove(0);
        }
    }

    /// Drain everything currently queued on the collector channel into the
    /// store. Returns how many entries were absorbed; never blocks.
    pub fn absorb(&self, receiver: &Receiver<DiagnosticEntry>) -> usize {
        let mut absorbed = 0;
        while let Ok(entry) = receiver.try_recv() {
            self.add_entry(entry);
            absorbed += 1;
        }
        absorbed
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().clone()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == DiagnosticLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == DiagnosticLevel::Warning)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: DiagnosticLevel, message: &str) -> DiagnosticEntry {
        DiagnosticEntry {
            timestamp: SystemTime::now(),
            level,
            message: message.to_string(),
            target: "tempo_assistant::tests".to_string(),
            file: None,
            line: None,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn test_counts_by_level() {
        let store = DiagnosticsStore::new(10);
        store.add_entry(entry(DiagnosticLevel::Error, "save failed"));
        store.add_entry(entry(DiagnosticLevel::Warning, "list load slow"));
        store.add_entry(entry(DiagnosticLevel::Error, "save failed again"));

        assert_eq!(store.error_count(), 2);
        assert_eq!(store.warning_count(), 1);
    }

    #[test]
    fn test_fifo_eviction() {
        let store = DiagnosticsStore::new(2);
        store.add_entry(entry(DiagnosticLevel::Error, "one"));
        store.add_entry(entry(DiagnosticLevel::Error, "two"));
        store.add_entry(entry(DiagnosticLevel::Error, "three"));

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "two");
        assert_eq!(entries[1].message, "three");
    }

    #[test]
    fn test_clear() {
        let store = DiagnosticsStore::new(10);
        store.add_entry(entry(DiagnosticLevel::Warning, "noise"));
        store.clear();
        assert!(store.entries().is_empty());
    }
}
