//! Typed event bus for transcript, session, and store notifications.
//!
//! Built on `tokio::sync::broadcast`: the core emits [`CoreEvent`]s, callers
//! hold [`EventSubscription`] handles.  Dropping a subscription unsubscribes
//! it deterministically — there is no listener list to leak.  Emission never
//! blocks; slow subscribers lose the oldest events (`Lagged`) rather than
//! stalling the pipeline.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::store::entities::TranscriptSegment;

// ---------------------------------------------------------------------------
// CoreEvent
// ---------------------------------------------------------------------------

/// Everything the core reports to its embedder.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A session row was created and transcription started (or was refused).
    SessionStarted { session_id: Uuid },

    /// A session was stopped and its `ended_at` recorded.
    SessionEnded { session_id: Uuid },

    /// One accepted, redacted transcript chunk.
    Transcript {
        session_id: Uuid,
        segment: TranscriptSegment,
    },

    /// Transcription could not start (no device/permission/backend); the
    /// session is in the `Disabled` state.  Signaled, not thrown.
    TranscriptionDisabled { session_id: Uuid, reason: String },

    /// The circuit breaker tripped and force-stopped the session.  Emitted
    /// exactly once per trip.
    SessionError { session_id: Uuid, message: String },

    /// The store fell back to ephemeral mode at open time.  Emitted once.
    PersistenceDegraded,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Cheap-to-clone sender half of the event channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe; the handle receives every event emitted after this call.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Emit an event to all current subscribers.  A bus with no subscribers
    /// drops the event silently.
    pub fn emit(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

// ---------------------------------------------------------------------------
// EventSubscription
// ---------------------------------------------------------------------------

/// Receiving handle; drop it to unsubscribe.
pub struct EventSubscription {
    rx: broadcast::Receiver<CoreEvent>,
}

impl EventSubscription {
    /// Wait for the next event.
    ///
    /// Returns `None` when the bus has been dropped.  A subscriber that
    /// fell behind skips the lost events and keeps receiving.
    pub async fn recv(&mut self) -> Option<CoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("event subscriber lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll used by synchronous callers and tests.
    pub fn try_recv(&mut self) -> Option<CoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("event subscriber lagged, skipped {skipped} events");
                }
                Err(_) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
