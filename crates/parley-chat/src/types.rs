//! Chat-facing types produced by the adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Function name used to surface agent progress events
pub const INFORMATIVE_MESSAGE_FUNCTION: &str = "InformativeMessage";

/// Function name used to ask the host to render an Adaptive Card
pub const RENDER_ADAPTIVE_CARD_FUNCTION: &str = "RenderAdaptiveCardAsync";

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Content blocks carried by messages and updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// A request for the host to perform a named action
    FunctionCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a function call with a fresh call id
    pub fn function_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::FunctionCall {
            call_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get the name and arguments if this is a function call
    pub fn as_function_call(&self) -> Option<(&str, &serde_json::Value)> {
        match self {
            Self::FunctionCall {
                name, arguments, ..
            } => Some((name, arguments)),
            _ => None,
        }
    }
}

/// A message in a chat exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub contents: Vec<Content>,
}

impl ChatMessage {
    /// Create a message with a single text block
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            contents: vec![Content::text(text)],
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, text)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, text)
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.contents
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One normalized unit of a streaming response.
///
/// Text updates are snapshots: a consumer replaces what it displays instead of
/// appending. A partial update carries all text streamed so far in the turn,
/// which may begin with earlier messages of the same turn; a complete update
/// carries exactly the text of its message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseUpdate {
    pub created_at: DateTime<Utc>,
    pub role: ChatRole,
    pub contents: Vec<Content>,
    /// Identifies the assistant message a text update belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Whether the text is the turn's streaming buffer rather than a complete message
    #[serde(default)]
    pub partial: bool,
}

impl ResponseUpdate {
    /// Create an assistant update
    pub fn assistant(created_at: DateTime<Utc>, contents: Vec<Content>) -> Self {
        Self {
            created_at,
            role: ChatRole::Assistant,
            contents,
            message_id: None,
            partial: false,
        }
    }

    /// Set the message id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Mark the text as a streaming snapshot of the turn
    pub fn mark_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.contents
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Check if this update carries any text content
    pub fn has_text(&self) -> bool {
        self.contents.iter().any(|c| c.as_text().is_some())
    }
}

/// Estimated token usage for a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDetails {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A complete response assembled from one streaming turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub messages: Vec<ChatMessage>,
    pub usage: UsageDetails,
    pub created_at: DateTime<Utc>,
    pub model_id: Option<String>,
}

impl AggregatedResponse {
    /// Get the combined text of all response messages
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model id to report on the aggregated response
    pub model_id: Option<String>,
}

/// Describes the service behind a chat client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatClientMetadata {
    pub provider_name: String,
    pub provider_uri: String,
    pub default_model_id: Option<String>,
}

impl ChatClientMetadata {
    /// Metadata for Copilot Studio agents
    pub fn copilot_studio() -> Self {
        Self {
            provider_name: "CopilotStudio".to_string(),
            provider_uri: "https://copilotstudio.microsoft.com".to_string(),
            default_model_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_skips_function_calls() {
        let message = ChatMessage {
            role: ChatRole::Assistant,
            contents: vec![
                Content::text("a"),
                Content::function_call("X", serde_json::json!({})),
                Content::text("b"),
            ],
        };
        assert_eq!(message.text(), "ab");
    }

    #[test]
    fn test_function_call_ids_are_unique() {
        let a = Content::function_call("X", serde_json::Value::Null);
        let b = Content::function_call("X", serde_json::Value::Null);
        assert_ne!(a, b);
    }

    #[test]
    fn test_update_has_text() {
        let now = Utc::now();
        assert!(ResponseUpdate::assistant(now, vec![Content::text("")]).has_text());
        let call = ResponseUpdate::assistant(
            now,
            vec![Content::function_call("X", serde_json::Value::Null)],
        );
        assert!(!call.has_text());
        assert_eq!(call.role, ChatRole::Assistant);
    }

    #[test]
    fn test_content_wire_shape() {
        let value = serde_json::to_value(Content::text("hi")).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "text", "text": "hi" }));
    }

    #[test]
    fn test_copilot_studio_metadata() {
        let metadata = ChatClientMetadata::copilot_studio();
        assert_eq!(metadata.provider_name, "CopilotStudio");
        assert_eq!(metadata.default_model_id, None);
    }
}
