use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::time::SystemTime;

use tracing::{
    Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::Layer;

use crate::models::diagnostics::{DiagnosticEntry, DiagnosticLevel};

/// Visitor to extract fields from tracing events
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value_str = format!("{:?}", value);

        if field.name() == "message" {
            self.message = Some(value_str);
        } else {
            self.fields.insert(field.name().to_string(), value_str);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }
    }
}

/// Tracing layer that captures WARN and ERROR events onto a bounded channel,
/// for absorption into a
/// [`DiagnosticsStore`](crate::models::diagnostics::DiagnosticsStore).
pub struct LogCollectorLayer {
    sender: SyncSender<DiagnosticEntry>,
}

impl LogCollectorLayer {
    pub fn new() -> (Self, Receiver<DiagnosticEntry>) {
        // Bounded to prevent memory exhaustion
        let (tx, rx) = sync_channel(1000);
        (Self { sender: tx }, rx)
    }
}

impl<S> Layer<S> for LogCollectorLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();

        if !matches!(*metadata.level(), Level::WARN | Level::ERROR) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let entry = DiagnosticEntry {
            timestamp: SystemTime::now(),
            level: if *metadata.level() == Level::ERROR {
                DiagnosticLevel::Error
            } else {
                DiagnosticLevel::Warning
            },
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            file: metadata.file().map(String::from),
            line: metadata.line(),
            fields: visitor.fields,
        };

        // Non-blocking send - drop if channel full (prevents backpressure)
        let _ = self.sender.try_send(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diagnostics::DiagnosticsStore;
    use tracing_subscriber::layer::SubscriberExt;

    fn setup_collector() -> (impl tracing::Subscriber, Receiver<DiagnosticEntry>) {
        let (layer, rx) = LogCollectorLayer::new();
        let subscriber = tracing_subscriber::registry().with(layer);
        (subscriber, rx)
    }

    #[test]
    fn test_captures_error_events() {
        let (subscriber, rx) = setup_collector();
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("turn dispatch failed");
        });

        let entry = rx.try_recv().expect("should receive an error entry");
        assert_eq!(entry.level, DiagnosticLevel::Error);
        assert!(entry.message.contains("turn dispatch failed"));
    }

    #[test]
    fn test_captures_warn_events_with_fields() {
        let (subscriber, rx) = setup_collector();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(conversation_id = "c-1", "auto-save failed");
        });

        let entry = rx.try_recv().expect("should receive a warning entry");
        assert_eq!(entry.level, DiagnosticLevel::Warning);
        assert_eq!(
            entry.fields.get("conversation_id").map(String::as_str),
            Some("c-1")
        );
    }

    #[test]
    fn test_ignores_info_and_below() {
        let (subscriber, rx) = setup_collector();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("list merged");
            tracing::debug!("turn state transition");
            tracing::trace!("noise");
        });

        assert!(rx.try_recv().is_err(), "should not receive any entry");
    }

    #[test]
    fn test_store_absorbs_collected_entries() {
        let (subscriber, rx) = setup_collector();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("first");
            tracing::error!("second");
        });

        let store = DiagnosticsStore::new(100);
        assert_eq!(store.absorb(&rx), 2);
        assert_eq!(store.warning_count(), 1);
        assert_eq!(store.error_count(), 1);
    }

    #[test]
    fn test_bounded_channel_drops_instead_of_panicking() {
        let (tx, _rx) = sync_channel(2);
        let layer = LogCollectorLayer { sender: tx };
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..10 {
                tracing::error!("overflow event {}", i);
            }
        });
    }
}
