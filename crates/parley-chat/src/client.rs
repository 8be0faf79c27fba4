//! Streaming chat client over an agent transport

use std::{pin::Pin, sync::Arc};

use async_stream::stream;
use async_trait::async_trait;
use chrono::Utc;
use parley_activity::{OutboundActivity, StreamingMetadata, Transport};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::accumulator::TextAccumulator;
use crate::aggregate::aggregate;
use crate::classify::classify;
use crate::error::{Error, Result};
use crate::session::{ConversationSession, ConversationState, next_activity};
use crate::types::{AggregatedResponse, ChatClientMetadata, ChatMessage, ChatOptions, ResponseUpdate};

/// A lazy stream of response updates for one turn
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ResponseUpdate>> + Send>>;

/// Chat-style access to a conversational backend
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Describe the backend
    fn metadata(&self) -> &ChatClientMetadata;

    /// Send the last of `messages` and stream the reply.
    ///
    /// Fails immediately with [`Error::InvalidArgument`] when `messages` is
    /// empty; nothing is sent in that case.
    fn get_streaming_response(
        &self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
        cancel: CancellationToken,
    ) -> Result<ResponseStream>;

    /// Send the last of `messages` and wait for the whole reply
    async fn get_response(
        &self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
        cancel: CancellationToken,
    ) -> Result<AggregatedResponse> {
        let stream = self.get_streaming_response(messages, options, cancel)?;
        aggregate(stream, messages, options, self.metadata()).await
    }
}

/// Chat client for a Copilot Studio agent.
///
/// Each instance owns one conversation, created on the first turn. Use one
/// client per logical chat session.
pub struct CopilotChatClient {
    transport: Arc<dyn Transport>,
    session: Arc<ConversationSession>,
    metadata: ChatClientMetadata,
}

impl CopilotChatClient {
    /// Create a client over `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            session: Arc::new(ConversationSession::new(Arc::clone(&transport))),
            transport,
            metadata: ChatClientMetadata::copilot_studio(),
        }
    }

    /// Lifecycle state of the underlying conversation
    pub fn conversation_state(&self) -> ConversationState {
        self.session.state()
    }

    /// Start the conversation ahead of the first turn
    pub async fn ensure_started(&self, cancel: &CancellationToken) -> Result<()> {
        self.session.ensure_started(cancel).await
    }

    /// Answer an Adaptive Card action with a pre-built invoke activity and
    /// stream the agent's reply
    pub fn send_card_action_response(
        &self,
        invoke_activity: OutboundActivity,
        cancel: CancellationToken,
    ) -> ResponseStream {
        self.run_turn(invoke_activity, cancel)
    }

    fn run_turn(&self, activity: OutboundActivity, cancel: CancellationToken) -> ResponseStream {
        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);

        Box::pin(stream! {
            if let Err(e) = session.ensure_started(&cancel).await {
                yield Err(e);
                return;
            }

            let created_at = Utc::now();
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(parley_activity::Error::Cancelled),
                sent = transport.send_activity(activity, cancel.clone()) => sent,
            };

            let mut inbound = match sent {
                Ok(inbound) => inbound,
                Err(e) => {
                    if e.is_session_expired() {
                        session.reset();
                    }
                    yield Err(Error::from(e));
                    return;
                }
            };

            let mut accumulator = TextAccumulator::new();
            loop {
                match next_activity(&mut inbound, &cancel).await {
                    Ok(Some(activity)) => {
                        let metadata = StreamingMetadata::parse(activity.channel_data.as_ref());
                        match classify(&activity, metadata.as_ref()) {
                            Some(kind) => {
                                tracing::debug!("Classified activity as {:?}", kind);
                                yield Ok(accumulator.apply(kind, created_at));
                            }
                            None => {
                                tracing::debug!(
                                    "Ignoring activity of type '{}'",
                                    activity.activity_type.as_str()
                                );
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        if e.is_session_expired() {
                            session.reset();
                        }
                        yield Err(Error::from(e));
                        return;
                    }
                }
            }
        })
    }
}

impl ChatClient for CopilotChatClient {
    fn metadata(&self) -> &ChatClientMetadata {
        &self.metadata
    }

    fn get_streaming_response(
        &self,
        messages: &[ChatMessage],
        _options: Option<&ChatOptions>,
        cancel: CancellationToken,
    ) -> Result<ResponseStream> {
        let last = messages
            .last()
            .ok_or_else(|| Error::InvalidArgument("At least one message is required".into()))?;

        Ok(self.run_turn(OutboundActivity::message(last.text()), cancel))
    }
}
