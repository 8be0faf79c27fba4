//! Transport abstraction for talking to an agent

pub mod copilot_studio;
pub mod echo;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{InboundActivity, OutboundActivity, Result};

pub use copilot_studio::{ConnectionSettings, CopilotStudioTransport, PowerPlatformCloud};
pub use echo::EchoTransport;

/// A stream of inbound activities for one exchange.
///
/// The stream ends when the agent signals end-of-turn. Dropping it releases
/// the underlying connection.
pub type ActivityStream = Pin<Box<dyn Stream<Item = Result<InboundActivity>> + Send>>;

/// Carries activities between the client and an agent
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a new conversation.
    ///
    /// The returned stream must be fully drained before the conversation can
    /// be considered created.
    async fn start_conversation(
        &self,
        emit_start_event: bool,
        cancel: CancellationToken,
    ) -> Result<ActivityStream>;

    /// Send one activity and stream the agent's reply for that turn
    async fn send_activity(
        &self,
        activity: OutboundActivity,
        cancel: CancellationToken,
    ) -> Result<ActivityStream>;
}
