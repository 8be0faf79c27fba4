//! Core activity types for the agent protocol

use serde::{Deserialize, Serialize};

/// Content type marking an attachment as an Adaptive Card payload
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Invoke name used when answering an Adaptive Card `Action.Execute`
pub const ADAPTIVE_CARD_ACTION_INVOKE: &str = "adaptiveCard/action";

/// Activity type as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Message,
    Event,
    Invoke,
    Typing,
    ConversationUpdate,
    EndOfConversation,
    /// Any type this crate does not interpret
    Other(String),
}

impl ActivityType {
    /// Get the wire name of this activity type
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Message => "message",
            ActivityType::Event => "event",
            ActivityType::Invoke => "invoke",
            ActivityType::Typing => "typing",
            ActivityType::ConversationUpdate => "conversationUpdate",
            ActivityType::EndOfConversation => "endOfConversation",
            ActivityType::Other(name) => name,
        }
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "message" => ActivityType::Message,
            "event" => ActivityType::Event,
            "invoke" => ActivityType::Invoke,
            "typing" => ActivityType::Typing,
            "conversationUpdate" => ActivityType::ConversationUpdate,
            "endOfConversation" => ActivityType::EndOfConversation,
            _ => ActivityType::Other(value),
        }
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

/// An attachment carried by an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    /// Create an Adaptive Card attachment from the card JSON
    pub fn adaptive_card(card: serde_json::Value) -> Self {
        Self {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
            content: Some(card),
            content_url: None,
            name: None,
        }
    }

    /// Check if this attachment is an Adaptive Card
    pub fn is_adaptive_card(&self) -> bool {
        self.content_type == ADAPTIVE_CARD_CONTENT_TYPE
    }
}

/// Conversation reference carried on inbound activities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

/// An activity received from the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Opaque side-channel payload; streaming metadata lives here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl InboundActivity {
    /// Create an inbound activity of the given type with no payload
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            id: None,
            text: None,
            name: None,
            attachments: vec![],
            channel_data: None,
            conversation: None,
            reply_to_id: None,
            value: None,
        }
    }

    /// Create a message activity with text
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(ActivityType::Message)
        }
    }

    /// Create a named event activity
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(ActivityType::Event)
        }
    }

    /// Set the activity id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the channel data payload
    pub fn with_channel_data(mut self, channel_data: serde_json::Value) -> Self {
        self.channel_data = Some(channel_data);
        self
    }

    /// Add an attachment
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Get the text, treating a missing text as empty
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Get the event name if it is non-empty
    pub fn event_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Kind of activity sent to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    Message,
    Invoke,
}

/// An activity sent to the agent for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundActivity {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl OutboundActivity {
    /// Create a plain text message
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Message,
            text: text.into(),
            name: None,
            value: None,
            attachments: vec![],
            reply_to_id: None,
        }
    }

    /// Create an invoke activity with a name and payload
    pub fn invoke(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            kind: OutboundKind::Invoke,
            text: String::new(),
            name: Some(name.into()),
            value: Some(value),
            attachments: vec![],
            reply_to_id: None,
        }
    }

    /// Create the invoke activity answering an Adaptive Card `Action.Execute`.
    ///
    /// `data` is the card's input values; `reply_to_id` is the id of the
    /// activity that carried the card.
    pub fn card_action(
        verb: Option<&str>,
        data: serde_json::Value,
        reply_to_id: Option<String>,
    ) -> Self {
        let mut action = serde_json::json!({
            "type": "Action.Execute",
            "data": data,
        });
        if let Some(verb) = verb {
            action["verb"] = serde_json::Value::String(verb.to_string());
        }

        Self {
            reply_to_id,
            ..Self::invoke(
                ADAPTIVE_CARD_ACTION_INVOKE,
                serde_json::json!({ "action": action, "trigger": "manual" }),
            )
        }
    }
}
