//! Per-turn text accumulation

use chrono::{DateTime, Utc};

use crate::classify::ActivityKind;
use crate::types::{
    Content, INFORMATIVE_MESSAGE_FUNCTION, RENDER_ADAPTIVE_CARD_FUNCTION, ResponseUpdate,
};

/// Turns classified activities into response updates, reassembling streamed
/// chunks into cumulative text.
///
/// One accumulator serves exactly one turn. The buffer only grows while the
/// turn runs, so partial updates may start with text of earlier messages in
/// the same turn.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    buffer: String,
    open: Option<OpenStream>,
}

/// The message currently being streamed
#[derive(Debug)]
struct OpenStream {
    message_id: String,
    stream_id: Option<String>,
}

impl TextAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated from streamed chunks so far
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Produce the update for one classified activity
    pub fn apply(&mut self, kind: ActivityKind, created_at: DateTime<Utc>) -> ResponseUpdate {
        match kind {
            ActivityKind::StreamingChunk { text, stream_id } => {
                self.buffer.push_str(&text);
                let message_id = self.stream_message_id(stream_id);

                ResponseUpdate::assistant(created_at, vec![Content::text(self.buffer.clone())])
                    .with_message_id(message_id)
                    .mark_partial()
            }
            ActivityKind::FinalMessage {
                text,
                stream_id,
                activity_id,
            } => {
                // Empty finals are typing pings and leave an open stream alone
                let message_id = if text.is_empty() {
                    activity_id.unwrap_or_else(new_message_id)
                } else {
                    self.close_stream(stream_id)
                        .or(activity_id)
                        .unwrap_or_else(new_message_id)
                };

                ResponseUpdate::assistant(created_at, vec![Content::text(text)])
                    .with_message_id(message_id)
            }
            ActivityKind::InformativeEvent { message } => ResponseUpdate::assistant(
                created_at,
                vec![Content::function_call(
                    INFORMATIVE_MESSAGE_FUNCTION,
                    serde_json::json!({
                        "message": message,
                        "sequence": 0,
                    }),
                )],
            ),
            ActivityKind::CardAttachment {
                card_json,
                activity_id,
            } => ResponseUpdate::assistant(
                created_at,
                vec![Content::function_call(
                    RENDER_ADAPTIVE_CARD_FUNCTION,
                    serde_json::json!({
                        "adaptiveCardJson": card_json,
                        "incomingActivityId": activity_id,
                    }),
                )],
            ),
        }
    }

    /// Message id for a chunk. A stream that opened without a `streamId`
    /// takes the first one it sees; a different `streamId` opens a new message.
    fn stream_message_id(&mut self, stream_id: Option<String>) -> String {
        let reopen = match (&self.open, &stream_id) {
            (None, _) => true,
            (Some(open), Some(id)) => open.stream_id.as_ref().is_some_and(|current| current != id),
            (Some(_), None) => false,
        };

        if reopen {
            self.open = Some(OpenStream {
                message_id: stream_id.clone().unwrap_or_else(new_message_id),
                stream_id,
            });
        } else if let Some(open) = self.open.as_mut() {
            if open.stream_id.is_none() {
                open.stream_id = stream_id;
            }
        }

        self.open
            .as_ref()
            .map(|open| open.message_id.clone())
            .unwrap_or_else(new_message_id)
    }

    /// Close the open stream and pick the id a final message completes
    fn close_stream(&mut self, stream_id: Option<String>) -> Option<String> {
        match (self.open.take(), stream_id) {
            (Some(open), Some(id)) if open.stream_id.as_ref().is_some_and(|s| *s != id) => Some(id),
            (Some(open), _) => Some(open.message_id),
            (None, stream_id) => stream_id,
        }
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
