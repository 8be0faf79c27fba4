//! parley-chat: streaming chat adapter
//!
//! This crate turns the activity stream of a conversational agent into a
//! chat-style interface: one outbound message in, a lazy stream of normalized
//! response updates out, or a single aggregated response.

pub mod accumulator;
pub mod aggregate;
pub mod classify;
pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use accumulator::TextAccumulator;
pub use aggregate::{ResponseAggregator, estimate_tokens};
pub use classify::{ActivityKind, classify};
pub use client::{ChatClient, CopilotChatClient, ResponseStream};
pub use error::{Error, Result};
pub use session::{ConversationSession, ConversationState};
pub use types::*;
