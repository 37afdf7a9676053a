use crate::models::{ConversationId, MessageKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat frame sent by a client. Fields are decoded loosely and checked by
/// [`InboundFrame::conversation_id`] and friends, so a bad field yields an
/// inline error instead of dropping the connection.
#[derive(Debug, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    conversation_id: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    attachment_url: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRejection {
    MissingConversationId,
    InvalidConversationId,
}

impl FrameRejection {
    pub fn message(&self) -> &'static str {
        match self {
            FrameRejection::MissingConversationId => "conversation_id is required",
            FrameRejection::InvalidConversationId => "conversation_id must be an integer",
        }
    }
}

impl InboundFrame {
    /// Fails only when `text` is not a JSON object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("frame must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Accepts a JSON integer or a numeric string.
    pub fn conversation_id(&self) -> Result<ConversationId, FrameRejection> {
        match &self.conversation_id {
            None | Some(Value::Null) => Err(FrameRejection::MissingConversationId),
            Some(Value::Number(n)) => n.as_i64().ok_or(FrameRejection::InvalidConversationId),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| FrameRejection::InvalidConversationId),
            Some(_) => Err(FrameRejection::InvalidConversationId),
        }
    }

    /// Anything but a recognised string tag is `text`.
    pub fn kind(&self) -> MessageKind {
        match &self.kind {
            Some(Value::String(tag)) => MessageKind::from_tag(tag),
            _ => MessageKind::Text,
        }
    }

    pub fn content(&self) -> Option<String> {
        non_empty_string(&self.content)
    }

    pub fn attachment_url(&self) -> Option<String> {
        non_empty_string(&self.attachment_url)
    }
}

fn non_empty_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Inline per-frame error; the session stays open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.error }).to_string()
    }
}
