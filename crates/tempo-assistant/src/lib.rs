//! AI assistant conversation and credit-metering engine for Tempo.
//!
//! The engine sits between the UI and the managed backend: it keeps the
//! local conversation cache consistent with the remote store under network
//! failure and throttling, meters the two-pool credit balance against
//! per-turn costs, debounces persistence into coalesced full-replace saves,
//! and preprocesses attachments before upload.
//!
//! Entry point is [`RequestDispatcher`], which wires the
//! [`ConversationStore`], [`CreditLedger`] and auto-save scheduler around a
//! `tempo-client` [`ApiClient`](tempo_client::ApiClient). State changes are
//! published through broadcast events ([`StoreEvent`], [`Notice`]); there is
//! no rendering-layer dependency anywhere in the engine.

pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use error::{SendError, SendResult};
pub use models::{
    Conversation, ConversationStore, CreditLedger, FileInfo, Message, Notice, NoticeKind,
    NoticeStore, StoreEvent,
};
pub use services::{LanguageService, PreparedFile, PreprocessError, RequestDispatcher, TurnState};

pub use tempo_client::types::{AssistantMode, Role, SubscriptionTier};
