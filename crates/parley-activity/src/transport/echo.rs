//! Echo transport - a local stand-in agent that streams back what it receives

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_stream::stream;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ActivityStream, Transport};
use crate::{
    ActivityType, ConversationAccount, InboundActivity, OutboundActivity, OutboundKind,
    error::{Error, Result},
};

/// Transport that answers every message with `"Echo: <text>"`, streamed in
/// small chunks the way a real agent streams its replies.
pub struct EchoTransport {
    chunk_size: usize,
    delay: Duration,
    conversation_id: String,
    started: AtomicBool,
}

impl EchoTransport {
    /// Create an echo transport with the default pacing (5 chars every 50ms)
    pub fn new() -> Self {
        Self {
            chunk_size: 5,
            delay: Duration::from_millis(50),
            conversation_id: uuid::Uuid::new_v4().to_string(),
            started: AtomicBool::new(false),
        }
    }

    /// Set how many characters each streamed chunk carries
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the pause before each chunk
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn conversation(&self) -> ConversationAccount {
        ConversationAccount {
            id: self.conversation_id.clone(),
        }
    }
}

impl Default for EchoTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text into chunks of at most `size` characters
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[async_trait]
impl Transport for EchoTransport {
    async fn start_conversation(
        &self,
        emit_start_event: bool,
        _cancel: CancellationToken,
    ) -> Result<ActivityStream> {
        self.started.store(true, Ordering::Release);

        let mut activities = vec![InboundActivity {
            conversation: Some(self.conversation()),
            ..InboundActivity::new(ActivityType::ConversationUpdate)
        }];
        if emit_start_event {
            activities.push(InboundActivity {
                conversation: Some(self.conversation()),
                ..InboundActivity::message("Hello! I repeat everything you say.")
            });
        }

        Ok(Box::pin(tokio_stream::iter(activities.into_iter().map(Ok::<_, Error>))))
    }

    async fn send_activity(
        &self,
        activity: OutboundActivity,
        cancel: CancellationToken,
    ) -> Result<ActivityStream> {
        if !self.started.load(Ordering::Acquire) {
            return Err(Error::ConversationNotStarted);
        }

        let conversation = self.conversation();
        let chunk_size = self.chunk_size;
        let delay = self.delay;

        let reply_stream: ActivityStream = Box::pin(stream! {
            let (prelude, reply) = match activity.kind {
                OutboundKind::Message => (None, format!("Echo: {}", activity.text)),
                OutboundKind::Invoke => {
                    let value = activity.value.clone().unwrap_or_default();
                    (
                        Some(InboundActivity::event("CardActionReceived")),
                        format!("Echo: {}", value),
                    )
                }
            };

            if let Some(event) = prelude {
                yield Ok(InboundActivity {
                    conversation: Some(conversation.clone()),
                    ..event
                });
            }

            let stream_id = uuid::Uuid::new_v4().to_string();
            for (index, chunk) in chunk_text(&reply, chunk_size).into_iter().enumerate() {
                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    yield Err(Error::Cancelled);
                    return;
                }

                yield Ok(InboundActivity {
                    conversation: Some(conversation.clone()),
                    ..InboundActivity::message(chunk).with_channel_data(serde_json::json!({
                        "streamType": "streaming",
                        "streamId": stream_id,
                        "streamSequence": index + 1,
                    }))
                });
            }

            yield Ok(InboundActivity {
                conversation: Some(conversation.clone()),
                ..InboundActivity::message(reply)
                    .with_id(uuid::Uuid::new_v4().to_string())
                    .with_channel_data(serde_json::json!({
                        "streamType": "final",
                        "streamId": stream_id,
                    }))
            });
        });

        Ok(reply_stream)
    }
}
