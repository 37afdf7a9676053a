use super::{conversation::ConversationId, user::UserId};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;

/// Longest prefix of a message kept as the conversation preview.
pub const PREVIEW_MAX_CHARS: usize = 140;

/// Preview shown when a message carries only an attachment.
pub const ATTACHMENT_PREVIEW: &str = "Image attachment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }

    /// Unrecognised tags decode as `Text`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" => MessageKind::Image,
            _ => MessageKind::Text,
        }
    }
}

/// A persisted message, also the shape pushed to live sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "timestamp")]
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Message accepted by the router, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn preview(&self) -> Option<String> {
        summary_preview(self.content.as_deref(), self.attachment_url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<Message>,
    pub total: i64,
}

/// Summary text for a conversation after `content`/`attachment_url` was sent.
///
/// Returns `None` when the message carries neither, leaving the previous preview.
pub fn summary_preview(content: Option<&str>, attachment_url: Option<&str>) -> Option<String> {
    match content {
        Some(text) if !text.is_empty() => Some(text.chars().take(PREVIEW_MAX_CHARS).collect()),
        _ => attachment_url
            .filter(|url| !url.is_empty())
            .map(|_| ATTACHMENT_PREVIEW.to_string()),
    }
}

/// Timestamp for the next message in a conversation whose latest message is `last`.
///
/// Microsecond precision (what Postgres stores) and strictly after `last`.
pub fn next_timestamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now
        .duration_trunc(Duration::microseconds(1))
        .unwrap_or(now);
    match last {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}
