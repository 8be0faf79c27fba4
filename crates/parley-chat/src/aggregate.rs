//! Draining a response stream into one aggregated response

use chrono::Utc;
use futures::StreamExt;

use crate::client::ResponseStream;
use crate::error::Result;
use crate::types::{
    AggregatedResponse, ChatClientMetadata, ChatMessage, ChatOptions, ResponseUpdate,
    UsageDetails,
};

/// Rough token estimate: a quarter of the character count, at least one for
/// any non-empty text.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    (chars / 4).max(1)
}

/// Collects the text of a response stream.
///
/// Each `message_id` keeps only its latest text. A complete update replaces its
/// message's text outright. A partial update carries the turn's whole
/// streaming buffer, so its message keeps only the part streamed since that
/// message began. Distinct messages are kept in the order they first appeared
/// and joined with a blank line. Updates without a message id are treated as
/// standalone messages.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    segments: Vec<Segment>,
    buffer_len: usize,
}

#[derive(Debug)]
struct Segment {
    message_id: Option<String>,
    /// Length of the streaming buffer when the message began
    base: usize,
    text: String,
}

impl ResponseAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one update into the collected text and return the current text of
    /// the message it belongs to
    pub fn push(&mut self, update: &ResponseUpdate) -> Option<&str> {
        if !update.has_text() {
            return None;
        }
        let text = update.text();

        let existing = update.message_id.as_ref().and_then(|id| {
            self.segments
                .iter()
                .position(|segment| segment.message_id.as_ref() == Some(id))
        });
        let index = match existing {
            Some(index) => index,
            None => {
                self.segments.push(Segment {
                    message_id: update.message_id.clone(),
                    base: self.buffer_len,
                    text: String::new(),
                });
                self.segments.len() - 1
            }
        };

        let segment = &mut self.segments[index];
        if update.partial {
            segment.text = match text.get(segment.base..) {
                Some(added) => added.to_string(),
                None => text.clone(),
            };
            self.buffer_len = text.len();
        } else {
            segment.text = text;
        }

        Some(&self.segments[index].text)
    }

    /// The collected text, trimmed
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the aggregated response for `messages`
    pub fn finish(
        self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
        metadata: &ChatClientMetadata,
    ) -> AggregatedResponse {
        let full_text = self.text();
        let last_message = messages.last().map(|m| m.text()).unwrap_or_default();

        let usage = UsageDetails {
            input_tokens: estimate_tokens(&last_message),
            output_tokens: estimate_tokens(&full_text),
        };

        let mut response_messages = Vec::new();
        if !full_text.is_empty() {
            response_messages.push(ChatMessage::assistant(full_text));
        }

        AggregatedResponse {
            messages: response_messages,
            usage,
            created_at: Utc::now(),
            model_id: options
                .and_then(|o| o.model_id.clone())
                .or_else(|| metadata.default_model_id.clone()),
        }
    }
}

/// Drain `stream` and aggregate it into a single response
pub async fn aggregate(
    mut stream: ResponseStream,
    messages: &[ChatMessage],
    options: Option<&ChatOptions>,
    metadata: &ChatClientMetadata,
) -> Result<AggregatedResponse> {
    let mut aggregator = ResponseAggregator::new();
    while let Some(update) = stream.next().await {
        aggregator.push(&update?);
    }
    Ok(aggregator.finish(messages, options, metadata))
}
