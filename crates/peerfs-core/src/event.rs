//! Session events.
//!
//! Every session publishes its lifecycle and per-block activity on a
//! broadcast channel. Subscribers that fall behind observe a lag and skip
//! ahead; events sent before a subscription are not replayed (use the
//! session status for current state).

use crate::peer::PeerId;
use crate::{Result, SessionError};
use peerfs_crypto::Tag;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Session event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Initialization finished; the session is addressable by `tag`
    Ready {
        /// Content tag
        tag: Tag,
    },
    /// Pacing loop started or resumed
    Started,
    /// A pacing tick picked `block`
    Processing {
        /// Block index
        block: u64,
    },
    /// `block` was sent to `peer`
    Publishing {
        /// Block index
        block: u64,
        /// Recipient
        peer: PeerId,
    },
    /// `block` was persisted locally (spreader only)
    Written {
        /// Block index
        block: u64,
        /// Peer the block came from
        credit: PeerId,
        /// Payload length
        bytes: usize,
        /// Known number of blocks
        block_count: u64,
    },
    /// Pacing loop stopped
    Paused,
    /// File restored (spreader only)
    Finished,
    /// Something failed
    Error {
        /// What failed
        error: SessionError,
    },
}

/// Discriminant of [`SessionEvent`], for per-kind waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`SessionEvent::Ready`]
    Ready,
    /// [`SessionEvent::Started`]
    Started,
    /// [`SessionEvent::Processing`]
    Processing,
    /// [`SessionEvent::Publishing`]
    Publishing,
    /// [`SessionEvent::Written`]
    Written,
    /// [`SessionEvent::Paused`]
    Paused,
    /// [`SessionEvent::Finished`]
    Finished,
    /// [`SessionEvent::Error`]
    Error,
}

impl SessionEvent {
    /// Kind of this event
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Ready { .. } => EventKind::Ready,
            SessionEvent::Started => EventKind::Started,
            SessionEvent::Processing { .. } => EventKind::Processing,
            SessionEvent::Publishing { .. } => EventKind::Publishing,
            SessionEvent::Written { .. } => EventKind::Written,
            SessionEvent::Paused => EventKind::Paused,
            SessionEvent::Finished => EventKind::Finished,
            SessionEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// Wait for the next event of `kind`, skipping everything else.
///
/// # Errors
///
/// Returns [`SessionError::Channel`] once the session is gone.
pub async fn next_of_kind(
    events: &mut broadcast::Receiver<SessionEvent>,
    kind: EventKind,
) -> Result<SessionEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.kind() == kind => return Ok(event),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::trace!(skipped, "Event subscriber lagged");
            }
            Err(RecvError::Closed) => return Err(SessionError::channel("event channel closed")),
        }
    }
}
