//! Conversation lifecycle: creating the conversation exactly once

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use parley_activity::{ActivityStream, InboundActivity, Transport};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Lifecycle state of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    NotStarted,
    Starting,
    Started,
}

/// Owns the start-once gate in front of a transport.
///
/// Concurrent first callers are serialized on an async lock so the transport's
/// start sequence runs at most once per successful start. A failed or
/// abandoned start leaves the state at `NotStarted`.
pub struct ConversationSession {
    transport: Arc<dyn Transport>,
    state: Mutex<ConversationState>,
    start_gate: tokio::sync::Mutex<()>,
}

impl ConversationSession {
    /// Create a session in the `NotStarted` state
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ConversationState::NotStarted),
            start_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConversationState {
        *self.state.lock()
    }

    /// Forget the conversation so the next turn starts a new one
    pub fn reset(&self) {
        *self.state.lock() = ConversationState::NotStarted;
    }

    /// Make sure the conversation exists, starting it if needed
    pub async fn ensure_started(&self, cancel: &CancellationToken) -> Result<()> {
        if self.state() == ConversationState::Started {
            return Ok(());
        }

        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(parley_activity::Error::Cancelled.into()),
            gate = self.start_gate.lock() => gate,
        };

        // Another caller may have finished the start while we waited
        if self.state() == ConversationState::Started {
            return Ok(());
        }

        let starting = StartingGuard::enter(&self.state);
        let drained = self.drain_start(cancel).await?;
        starting.commit();

        tracing::info!("Conversation started ({} start activities drained)", drained);
        Ok(())
    }

    async fn drain_start(&self, cancel: &CancellationToken) -> Result<usize> {
        let mut activities = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(parley_activity::Error::Cancelled.into()),
            stream = self.transport.start_conversation(true, cancel.clone()) => stream?,
        };

        let mut drained = 0;
        while next_activity(&mut activities, cancel).await?.is_some() {
            drained += 1;
        }
        Ok(drained)
    }
}

/// Marks the state `Starting` and rolls it back to `NotStarted` unless
/// committed, including when the start future is dropped mid-flight.
struct StartingGuard<'a> {
    state: &'a Mutex<ConversationState>,
    committed: bool,
}

impl<'a> StartingGuard<'a> {
    fn enter(state: &'a Mutex<ConversationState>) -> Self {
        *state.lock() = ConversationState::Starting;
        Self {
            state,
            committed: false,
        }
    }

    fn commit(mut self) {
        *self.state.lock() = ConversationState::Started;
        self.committed = true;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            *self.state.lock() = ConversationState::NotStarted;
        }
    }
}

/// Wait for the next activity, giving up when `cancel` fires
pub(crate) async fn next_activity(
    stream: &mut ActivityStream,
    cancel: &CancellationToken,
) -> parley_activity::Result<Option<InboundActivity>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(parley_activity::Error::Cancelled),
        next = stream.next() => next.transpose(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_activity::{OutboundActivity, Result as TransportResult};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// A transport whose start sequence can be made to fail or stall
    struct StartTransport {
        start_calls: AtomicU32,
        drained: Arc<AtomicU32>,
        failures_left: AtomicU32,
        challenge: bool,
        delay: Duration,
    }

    impl StartTransport {
        fn new() -> Self {
            Self {
                start_calls: AtomicU32::new(0),
                drained: Arc::new(AtomicU32::new(0)),
                failures_left: AtomicU32::new(0),
                challenge: false,
                delay: Duration::ZERO,
            }
        }

        fn failing(times: u32) -> Self {
            let transport = Self::new();
            transport.failures_left.store(times, Ordering::SeqCst);
            transport
        }
    }

    #[async_trait]
    impl Transport for StartTransport {
        async fn start_conversation(
            &self,
            _emit_start_event: bool,
            _cancel: CancellationToken,
        ) -> TransportResult<ActivityStream> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.challenge {
                return Err(parley_activity::Error::SessionExpired);
            }

            let fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let drained = Arc::clone(&self.drained);
            let delay = self.delay;

            Ok(Box::pin(async_stream::stream! {
                tokio::time::sleep(delay).await;
                drained.fetch_add(1, Ordering::SeqCst);
                yield Ok(InboundActivity::new(parley_activity::ActivityType::ConversationUpdate));
                if fail {
                    yield Err(parley_activity::Error::Sse("connection reset".into()));
                    return;
                }
                drained.fetch_add(1, Ordering::SeqCst);
                yield Ok(InboundActivity::message("Hi there"));
            }))
        }

        async fn send_activity(
            &self,
            _activity: OutboundActivity,
            _cancel: CancellationToken,
        ) -> TransportResult<ActivityStream> {
            Ok(Box::pin(tokio_stream::empty()))
        }
    }

    #[tokio::test]
    async fn test_starts_once() {
        let transport = Arc::new(StartTransport::new());
        let session = ConversationSession::new(transport.clone());
        assert_eq!(session.state(), ConversationState::NotStarted);

        let cancel = CancellationToken::new();
        session.ensure_started(&cancel).await.unwrap();
        session.ensure_started(&cancel).await.unwrap();

        assert_eq!(session.state(), ConversationState::Started);
        assert_eq!(transport.start_calls.load(Ordering::SeqCst), 1);
        // Both start activities were drained
        assert_eq!(transport.drained.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_start_can_retry() {
        let transport = Arc::new(StartTransport::failing(1));
        let session = ConversationSession::new(transport.clone());
        let cancel = CancellationToken::new();

        let err = session.ensure_started(&cancel).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(session.state(), ConversationState::NotStarted);

        session.ensure_started(&cancel).await.unwrap();
        assert_eq!(session.state(), ConversationState::Started);
        assert_eq!(transport.start_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_challenge_leaves_not_started() {
        let transport = Arc::new(StartTransport {
            challenge: true,
            ..StartTransport::new()
        });
        let session = ConversationSession::new(transport);

        let err = session
            .ensure_started(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_session_expired());
        assert_eq!(session.state(), ConversationState::NotStarted);
    }

    #[tokio::test]
    async fn test_cancelled_start_leaves_not_started() {
        let transport = Arc::new(StartTransport {
            delay: Duration::from_secs(60),
            ..StartTransport::new()
        });
        let session = ConversationSession::new(transport);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = session.ensure_started(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(session.state(), ConversationState::NotStarted);
    }

    #[tokio::test]
    async fn test_dropped_start_rolls_back() {
        let transport = Arc::new(StartTransport {
            delay: Duration::from_secs(60),
            ..StartTransport::new()
        });
        let session = ConversationSession::new(transport);
        let cancel = CancellationToken::new();

        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            session.ensure_started(&cancel),
        )
        .await;
        assert!(attempt.is_err(), "start should still be pending");
        assert_eq!(session.state(), ConversationState::NotStarted);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_start_once() {
        let transport = Arc::new(StartTransport {
            delay: Duration::from_millis(30),
            ..StartTransport::new()
        });
        let session = ConversationSession::new(transport.clone());
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(session.ensure_started(&cancel), session.ensure_started(&cancel));
        a.unwrap();
        b.unwrap();

        assert_eq!(transport.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), ConversationState::Started);
    }

    #[tokio::test]
    async fn test_reset() {
        let transport = Arc::new(StartTransport::new());
        let session = ConversationSession::new(transport.clone());
        let cancel = CancellationToken::new();

        session.ensure_started(&cancel).await.unwrap();
        session.reset();
        assert_eq!(session.state(), ConversationState::NotStarted);

        session.ensure_started(&cancel).await.unwrap();
        assert_eq!(transport.start_calls.load(Ordering::SeqCst), 2);
    }
}
