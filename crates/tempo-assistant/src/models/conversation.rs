use chrono::{DateTime, Utc};

use tempo_client::types::{
    AssistantMode, ConversationRecord, FileInfoRecord, MessageRecord, Role,
};

/// Title given to a conversation before its first user message arrives.
pub const UNTITLED: &str = "New conversation";

const MAX_TITLE_LEN: usize = 60;

/// Attachment metadata shown next to a message. The preview is
/// presentation-only; the upload payload travels separately.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub media_type: String,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub file_info: Option<FileInfo>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            file_info: None,
        }
    }

    pub fn user_with_file(content: impl Into<String>, file_info: FileInfo) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            file_info: Some(file_info),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            file_info: None,
        }
    }
}

/// A single conversation with the assistant.
///
/// Message order is append-only and never reordered; history is immutable
/// once persisted except for whole-conversation deletion.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    title: String,
    mode: AssistantMode,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation. The id is client-generated and assigned
    /// before the first successful save; no backend contact happens here.
    pub fn new(mode: AssistantMode) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: UNTITLED.to_string(),
            mode,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message in arrival order and refresh `updated_at`. The first
    /// user message also titles an untitled conversation.
    pub fn push_message(&mut self, message: Message) {
        if self.title == UNTITLED && message.role == Role::User {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Remove and return the newest message. This is the rollback of a
    /// rejected optimistic append, not an accepted mutation, so `updated_at`
    /// is left alone.
    pub fn pop_message(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mode(&self) -> AssistantMode {
        self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn to_record(&self) -> ConversationRecord {
        ConversationRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            mode: self.mode,
            messages: self.messages.iter().map(message_to_record).collect(),
            created_at: self.created_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
        }
    }

    pub fn from_record(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            mode: record.mode,
            messages: record.messages.into_iter().map(message_from_record).collect(),
            created_at: timestamp_from_millis(record.created_at),
            updated_at: timestamp_from_millis(record.updated_at),
        }
    }
}

fn timestamp_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn message_to_record(message: &Message) -> MessageRecord {
    MessageRecord {
        role: message.role,
        content: message.content.clone(),
        file_info: message.file_info.as_ref().map(|info| FileInfoRecord {
            name: info.name.clone(),
            media_type: info.media_type.clone(),
            preview_data: info.preview.clone(),
        }),
    }
}

fn message_from_record(record: MessageRecord) -> Message {
    Message {
        role: record.role,
        content: record.content,
        file_info: record.file_info.map(|info| FileInfo {
            name: info.name,
            media_type: info.media_type,
            preview: info.preview_data,
        }),
    }
}

/// Build a title from the first user message: trimmed, unquoted, first line
/// only, capped in length.
fn derive_title(content: &str) -> String {
    let cleaned = content
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .next()
        .unwrap_or(UNTITLED)
        .trim()
        .to_string();

    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else if cleaned.chars().count() > MAX_TITLE_LEN {
        let truncated: String = cleaned.chars().take(MAX_TITLE_LEN - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}
