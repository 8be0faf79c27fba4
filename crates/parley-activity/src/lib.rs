//! parley-activity: activity protocol layer
//!
//! This crate provides the activity types exchanged with a Copilot Studio agent,
//! the channel metadata parser used to detect streamed text, and the transports
//! that carry activities to and from the agent.

pub mod auth;
pub mod error;
pub mod metadata;
pub mod transport;
pub mod types;

pub use auth::{StaticTokenProvider, TokenError, TokenProvider};
pub use error::{Error, Result};
pub use metadata::{StreamType, StreamingMetadata};
pub use transport::{ActivityStream, Transport};
pub use types::*;
