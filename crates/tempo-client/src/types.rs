use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Assistant capability a conversation is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistantMode {
    Chat,
    FileAnalysis,
}

impl AssistantMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantMode::Chat => "chat",
            AssistantMode::FileAnalysis => "file-analysis",
        }
    }
}

/// Subscription tier carried by the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Standard,
    Elevated,
}

impl SubscriptionTier {
    pub fn is_free(&self) -> bool {
        matches!(self, SubscriptionTier::Free)
    }
}

/// Attachment metadata attached to a message. `preview_data` is
/// presentation-only and never substitutes for the upload payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfoRecord>,
}

/// Serializable conversation shape used by the list and upsert endpoints.
/// Timestamps are unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub mode: AssistantMode,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Body of a plain chat turn. Only the new user message travels; the backend
/// holds whatever context it needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub message: String,
    pub mode: AssistantMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
}

/// Response shared by the chat and file-analysis turn endpoints. Remaining
/// credit figures are authoritative when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub response: String,
    #[serde(default)]
    pub remaining_monthly_credits: Option<u32>,
    #[serde(default)]
    pub remaining_purchased_credits: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub subscription_tier: SubscriptionTier,
    pub ai_credits_monthly: u32,
    pub ai_credits_purchased: u32,
}

/// Binary payload for the multipart file-analysis turn.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&AssistantMode::FileAnalysis).unwrap(),
            "\"file-analysis\""
        );
        assert_eq!(serde_json::to_string(&AssistantMode::Chat).unwrap(), "\"chat\"");
    }

    #[test]
    fn test_conversation_record_round_trip() {
        let record = ConversationRecord {
            id: "c-1".to_string(),
            title: "Plan the week".to_string(),
            mode: AssistantMode::Chat,
            messages: vec![MessageRecord {
                role: Role::User,
                content: "Hello".to_string(),
                file_info: None,
            }],
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_500,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"createdAt\""), "wire uses camelCase: {json}");
        assert!(json.contains("\"user\""));

        let back: ConversationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "c-1");
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.messages[0].role, Role::User);
    }

    #[test]
    fn test_record_messages_default_when_absent() {
        let json = r#"{"id":"c-2","title":"","mode":"chat","createdAt":0,"updatedAt":0}"#;
        let record: ConversationRecord = serde_json::from_str(json).unwrap();
        assert!(record.messages.is_empty());
    }

    #[test]
    fn test_turn_response_optional_credits() {
        let full: TurnResponse = serde_json::from_str(
            r#"{"response":"Hi!","remainingMonthlyCredits":48,"remainingPurchasedCredits":10}"#,
        )
        .unwrap();
        assert_eq!(full.remaining_monthly_credits, Some(48));
        assert_eq!(full.remaining_purchased_credits, Some(10));

        let bare: TurnResponse = serde_json::from_str(r#"{"response":"Hi!"}"#).unwrap();
        assert_eq!(bare.remaining_monthly_credits, None);
        assert_eq!(bare.remaining_purchased_credits, None);
    }

    #[test]
    fn test_profile_tiers() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"subscriptionTier":"elevated","aiCreditsMonthly":500,"aiCreditsPurchased":0}"#,
        )
        .unwrap();
        assert_eq!(profile.subscription_tier, SubscriptionTier::Elevated);
        assert!(!profile.subscription_tier.is_free());
    }

    #[test]
    fn test_language_hint_omitted_when_none() {
        let request = TurnRequest {
            message: "Hello".to_string(),
            mode: AssistantMode::Chat,
            language_hint: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("languageHint"));
    }
}
