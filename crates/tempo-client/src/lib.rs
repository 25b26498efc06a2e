//! Client library for the Tempo backend API.
//!
//! Exposes a typed [`ApiClient`] over the conversation store, the AI turn
//! endpoints and the user profile, plus the wire-level DTOs shared with the
//! assistant engine. Retry policy deliberately lives with the caller: a
//! throttled response is reported as [`ApiError::RateLimited`] and treated as
//! deferred availability, never retried inside this crate.

pub mod client;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use types::{
    AssistantMode, ConversationRecord, FileInfoRecord, FilePayload, MessageRecord, Role,
    SubscriptionTier, TurnRequest, TurnResponse, UserProfile,
};
