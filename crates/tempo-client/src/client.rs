use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, header};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::types::{
    ConversationRecord, FilePayload, TurnRequest, TurnResponse, UserProfile,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the Tempo backend API.
///
/// One instance per authenticated session; cheap to share behind an `Arc`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: auth_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Map the response status onto the error taxonomy. 429 carries the
    /// parsed `Retry-After` seconds when the backend provides them.
    async fn check(response: Response) -> ApiResult<Response> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ApiError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Load all conversations, most-recently-updated first.
    pub async fn list_conversations(&self) -> ApiResult<Vec<ConversationRecord>> {
        debug!("loading conversation list");

        let response = self
            .http
            .get(self.url("conversations"))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Full-replace upsert of one conversation.
    pub async fn upsert_conversation(
        &self,
        record: &ConversationRecord,
    ) -> ApiResult<ConversationRecord> {
        debug!(
            conversation_id = %record.id,
            messages = record.messages.len(),
            "saving conversation"
        );

        let response = self
            .http
            .post(self.url("conversations"))
            .bearer_auth(&self.auth_token)
            .json(record)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Delete a conversation by id. Idempotent on the backend.
    pub async fn delete_conversation(&self, id: &str) -> ApiResult<()> {
        debug!(conversation_id = %id, "deleting conversation");

        let response = self
            .http
            .delete(self.url("conversations"))
            .bearer_auth(&self.auth_token)
            .query(&[("id", id)])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    /// Send one plain chat turn.
    pub async fn chat_turn(&self, request: &TurnRequest) -> ApiResult<TurnResponse> {
        debug!(mode = request.mode.as_str(), "sending chat turn");

        let response = self
            .http
            .post(self.url("chat-turn"))
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Send one file-analysis turn as multipart: the file binary, the prompt
    /// text and the optional language hint.
    pub async fn file_analysis_turn(
        &self,
        file: FilePayload,
        prompt: &str,
        language_hint: Option<&str>,
    ) -> ApiResult<TurnResponse> {
        debug!(
            file_name = %file.name,
            media_type = %file.media_type,
            size = file.bytes.len(),
            "sending file-analysis turn"
        );

        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.media_type)?;

        let mut form = Form::new()
            .part("file", part)
            .text("prompt", prompt.to_string());
        if let Some(lang) = language_hint {
            form = form.text("languageHint", lang.to_string());
        }

        let response = self
            .http
            .post(self.url("file-analysis-turn"))
            .bearer_auth(&self.auth_token)
            .multipart(form)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the user profile consumed to initialize the credit ledger.
    pub async fn fetch_profile(&self) -> ApiResult<UserProfile> {
        debug!("fetching user profile");

        let response = self
            .http
            .get(self.url("user-profile"))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }
}
