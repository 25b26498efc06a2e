pub mod autosave_scheduler;
pub mod conversation;
pub mod conversations_store;
pub mod credit_ledger;
pub mod diagnostics;
pub mod notice_store;

pub use autosave_scheduler::{AUTOSAVE_DEBOUNCE, AutoSaveScheduler, ConversationSaver};
pub use conversation::{Conversation, FileInfo, Message, UNTITLED};
pub use conversations_store::{ConversationStore, StoreEvent};
pub use credit_ledger::{CHAT_TURN_COST, CreditLedger, FILE_ANALYSIS_TURN_COST};
pub use diagnostics::{DiagnosticEntry, DiagnosticLevel, DiagnosticsStore};
pub use notice_store::{Notice, NoticeKind, NoticeStore};
