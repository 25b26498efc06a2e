use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use tempo_client::types::{AssistantMode, TurnRequest};
use tempo_client::{ApiClient, ApiError, ApiResult};

use crate::error::{SendError, SendResult};
use crate::models::autosave_scheduler::{AUTOSAVE_DEBOUNCE, AutoSaveScheduler, ConversationSaver};
use crate::models::conversation::{Conversation, FileInfo, Message};
use crate::models::conversations_store::ConversationStore;
use crate::models::credit_ledger::{CHAT_TURN_COST, CreditLedger, FILE_ANALYSIS_TURN_COST};
use crate::models::notice_store::{NoticeKind, NoticeStore};
use crate::repositories::kv_store::{KeyValueStore, LAST_LANGUAGE_KEY};
use crate::services::file_preprocessor::PreparedFile;
use crate::services::language_service::LanguageService;

/// Delay before the single silent retry of a throttled list load.
pub const LIST_RETRY_DELAY: Duration = Duration::from_secs(60);

const DEFAULT_LANGUAGE: &str = "en";

/// Lifecycle of the most recent outbound turn for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Sending,
    Success,
    RateLimited,
    Failed,
}

/// Saver wiring the auto-save scheduler to the backend upsert endpoint.
pub struct ApiConversationSaver {
    client: Arc<ApiClient>,
}

impl ApiConversationSaver {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl ConversationSaver for ApiConversationSaver {
    fn save(&self, snapshot: Conversation) -> BoxFuture<'static, ApiResult<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            client.upsert_conversation(&snapshot.to_record()).await?;
            Ok(())
        })
    }
}

/// Sends the user's turn to the correct backend capability and translates
/// the response into store and ledger updates.
///
/// Owns the wiring of the engine: it builds the conversation store around an
/// [`ApiConversationSaver`] so every accepted mutation debounces into a
/// full-replace upsert, gates dispatch on the credit ledger, and applies the
/// per-call-site throttling policy (silent single retry for background list
/// loads, surfaced-without-retry for user-initiated sends).
pub struct RequestDispatcher {
    client: Arc<ApiClient>,
    store: Arc<Mutex<ConversationStore>>,
    ledger: Arc<Mutex<CreditLedger>>,
    notices: Arc<NoticeStore>,
    language: Arc<LanguageService>,
    hints: Arc<dyn KeyValueStore>,
    language_hint: Mutex<Option<String>>,
    turns: Mutex<HashMap<String, TurnState>>,
    list_retry_delay: Duration,
}

impl RequestDispatcher {
    pub fn new(
        client: Arc<ApiClient>,
        notices: Arc<NoticeStore>,
        language: Arc<LanguageService>,
        hints: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_timing(
            client,
            notices,
            language,
            hints,
            AUTOSAVE_DEBOUNCE,
            LIST_RETRY_DELAY,
        )
    }

    /// Custom debounce and retry delays (test seam; production uses
    /// [`AUTOSAVE_DEBOUNCE`] and [`LIST_RETRY_DELAY`]).
    pub fn with_timing(
        client: Arc<ApiClient>,
        notices: Arc<NoticeStore>,
        language: Arc<LanguageService>,
        hints: Arc<dyn KeyValueStore>,
        autosave_debounce: Duration,
        list_retry_delay: Duration,
    ) -> Self {
        let saver: Arc<dyn ConversationSaver> = Arc::new(ApiConversationSaver::new(client.clone()));
        let scheduler = AutoSaveScheduler::with_delay(saver, autosave_debounce);
        let store = Arc::new(Mutex::new(ConversationStore::new(scheduler)));

        Self {
            client,
            store,
            ledger: Arc::new(Mutex::new(CreditLedger::empty())),
            notices,
            language,
            hints,
            language_hint: Mutex::new(None),
            turns: Mutex::new(HashMap::new()),
            list_retry_delay,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<ConversationStore>> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<Mutex<CreditLedger>> {
        &self.ledger
    }

    /// Initialize the credit ledger from the user profile.
    pub async fn load_profile(&self) -> ApiResult<()> {
        let profile = self.client.fetch_profile().await?;
        self.ledger.lock().apply_profile(&profile);
        info!(tier = ?profile.subscription_tier, "profile loaded");
        Ok(())
    }

    /// Restore the last-used language hint from storage.
    pub async fn load_language_hint(&self) {
        match self.hints.get(LAST_LANGUAGE_KEY).await {
            Ok(Some(language)) => {
                debug!(language = %language, "language hint restored");
                *self.language_hint.lock() = Some(language);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to read language hint"),
        }
    }

    pub fn language_hint(&self) -> Option<String> {
        self.language_hint.lock().clone()
    }

    /// Remember the language for subsequent turns and persist it as a
    /// session hint.
    pub async fn set_language_hint(&self, language: impl Into<String>) {
        let language = language.into();
        *self.language_hint.lock() = Some(language.clone());
        if let Err(err) = self.hints.set(LAST_LANGUAGE_KEY, language).await {
            warn!(error = %err, "failed to persist language hint");
        }
    }

    pub fn create_conversation(&self, mode: AssistantMode) -> String {
        self.store.lock().create(mode)
    }

    pub fn switch_conversation(&self, id: &str) -> bool {
        self.store.lock().switch_active(id)
    }

    /// Flush all pending saves (view unload).
    pub fn flush_pending(&self) {
        self.store.lock().flush_pending();
    }

    pub fn turn_state(&self, conversation_id: &str) -> TurnState {
        self.turns
            .lock()
            .get(conversation_id)
            .copied()
            .unwrap_or_default()
    }

    fn set_turn_state(&self, conversation_id: &str, state: TurnState) {
        let previous = self
            .turns
            .lock()
            .insert(conversation_id.to_string(), state);
        debug!(conversation_id = %conversation_id, ?previous, ?state, "turn state");
    }

    fn notify(&self, kind: NoticeKind, key: &str, conversation_id: Option<&str>) {
        let language = self
            .language_hint
            .lock()
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let message = self.language.translate(&language, key);
        self.notices
            .push(kind, message, conversation_id.map(str::to_string));
    }

    /// Send one user turn, optionally with a prepared attachment.
    ///
    /// On success the assistant reply is appended and the ledger reconciled
    /// with the returned balances. On throttling the optimistic user message
    /// stays for manual resubmission. On any other failure the optimistic
    /// message is rolled back.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: impl Into<String>,
        attachment: Option<PreparedFile>,
    ) -> SendResult<String> {
        let content = content.into();

        let mode = self
            .store
            .lock()
            .get(conversation_id)
            .map(|c| c.mode())
            .ok_or_else(|| SendError::UnknownConversation(conversation_id.to_string()))?;

        // Request shape: file-analysis mode with an attachment goes multipart.
        let use_file_turn = mode == AssistantMode::FileAnalysis && attachment.is_some();
        let cost = if use_file_turn {
            FILE_ANALYSIS_TURN_COST
        } else {
            CHAT_TURN_COST
        };

        // Credit gate, before anything reaches the network.
        if !self.ledger.lock().can_afford(cost) {
            debug!(conversation_id = %conversation_id, cost, "dispatch blocked on credits");
            self.notify(
                NoticeKind::UpgradePrompt,
                "assistant.notice.upgrade",
                Some(conversation_id),
            );
            return Err(SendError::InsufficientCredits);
        }

        // Sends are serialized per conversation: reject, never queue.
        {
            let mut turns = self.turns.lock();
            if turns.get(conversation_id) == Some(&TurnState::Sending) {
                return Err(SendError::SendInProgress);
            }
            turns.insert(conversation_id.to_string(), TurnState::Sending);
        }

        // Optimistic user message.
        let message = match &attachment {
            Some(file) => Message::user_with_file(
                content.clone(),
                FileInfo {
                    name: file.name.clone(),
                    media_type: file.media_type.clone(),
                    preview: file.preview.clone(),
                },
            ),
            None => Message::user(content.clone()),
        };
        self.store.lock().append(conversation_id, message);

        let language_hint = self.language_hint.lock().clone();
        let result = match attachment {
            Some(file) if use_file_turn => {
                self.client
                    .file_analysis_turn(file.into(), &content, language_hint.as_deref())
                    .await
            }
            _ => {
                self.client
                    .chat_turn(&TurnRequest {
                        message: content,
                        mode,
                        language_hint,
                    })
                    .await
            }
        };

        match result {
            Ok(turn) => {
                self.store
                    .lock()
                    .append(conversation_id, Message::assistant(turn.response.clone()));
                self.ledger
                    .lock()
                    .reconcile(turn.remaining_monthly_credits, turn.remaining_purchased_credits);
                self.set_turn_state(conversation_id, TurnState::Success);
                Ok(turn.response)
            }
            Err(ApiError::RateLimited { retry_after }) => {
                // The optimistic message stays; retrying silently could
                // produce duplicate-looking turns.
                warn!(conversation_id = %conversation_id, ?retry_after, "send throttled");
                self.set_turn_state(conversation_id, TurnState::RateLimited);
                self.notify(
                    NoticeKind::InlineError,
                    "assistant.notice.rate_limited",
                    Some(conversation_id),
                );
                Err(SendError::RateLimited)
            }
            Err(err) => {
                let retracted = self.store.lock().pop_message(conversation_id);
                error!(
                    conversation_id = %conversation_id,
                    error = %err,
                    retracted = retracted.is_some(),
                    "turn failed"
                );
                self.set_turn_state(conversation_id, TurnState::Failed);
                self.notify(
                    NoticeKind::InlineError,
                    "assistant.notice.turn_failed",
                    Some(conversation_id),
                );
                Err(SendError::Turn(err))
            }
        }
    }

    /// Load the remote conversation list and merge it into the store.
    ///
    /// Background flow: a throttled response is retried exactly once after
    /// the fixed delay with no user-visible error; any other failure is
    /// logged and returned.
    pub async fn refresh_conversations(&self) -> ApiResult<()> {
        let records = match self.client.list_conversations().await {
            Ok(records) => records,
            Err(ApiError::RateLimited { retry_after }) => {
                debug!(
                    ?retry_after,
                    delay = ?self.list_retry_delay,
                    "list load throttled, retrying once"
                );
                tokio::time::sleep(self.list_retry_delay).await;
                match self.client.list_conversations().await {
                    Ok(records) => records,
                    Err(err) => {
                        warn!(error = %err, "list load retry failed");
                        return Err(err);
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "list load failed");
                return Err(err);
            }
        };

        let (added, replaced) = self.store.lock().merge_remote(records);
        info!(added, replaced, "conversation list refreshed");
        Ok(())
    }

    /// Optimistically remove the conversation locally, then delete it on the
    /// backend. Deletion is idempotent by id, so a failed backend delete is
    /// logged without rolling the local removal back.
    pub async fn delete_conversation(&self, id: &str) -> ApiResult<()> {
        self.store.lock().remove(id);
        match self.client.delete_conversation(id).await {
            Ok(()) => {
                debug!(conversation_id = %id, "conversation deleted");
                Ok(())
            }
            Err(err) => {
                warn!(conversation_id = %id, error = %err, "backend delete failed");
                Err(err)
            }
        }
    }
}
