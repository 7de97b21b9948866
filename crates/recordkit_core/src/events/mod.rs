//! Session-commit event port.
//!
//! # Responsibility
//! - Carry "a session was committed" notifications from sessions to the
//!   owning container without process-global observer state.
//!
//! # Invariants
//! - Events carry owned change sets only; no mutable record instance
//!   crosses a session boundary.
//! - Delivery is queued, never re-entered from within a commit.

use crate::store::ChangeSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// Identifier for one session instance.
pub type SessionId = Uuid;

/// Notification emitted when a session commit completes.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Saved {
        session: SessionId,
        parent: Option<SessionId>,
        /// Changes a child session hands upward. Empty for root commits,
        /// whose changes already reached the store.
        changes: ChangeSet,
    },
}

/// Publishing half of the event port, cloned into each session.
#[derive(Clone)]
pub struct SessionEventSender {
    sender: Sender<SessionEvent>,
}

impl SessionEventSender {
    /// Publishes an event. A missing subscriber drops the event silently;
    /// a detached session has nobody left to propagate to.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

/// Subscribing half of the event port, owned by the container.
pub struct SessionEventReceiver {
    receiver: Receiver<SessionEvent>,
}

impl SessionEventReceiver {
    /// Drains all currently queued events.
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Creates a connected publish/subscribe pair.
pub fn session_events() -> (SessionEventSender, SessionEventReceiver) {
    let (sender, receiver) = channel();
    (
        SessionEventSender { sender },
        SessionEventReceiver { receiver },
    )
}
