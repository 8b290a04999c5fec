//! Observable controller events

use tokio::sync::mpsc;

use crate::domain::session::{LifecycleState, Session};

use super::ports::ServiceError;

/// Something the controller did or observed.
///
/// Failure events are informational; the matching error is also
/// returned to whoever issued the command, except for chunk uploads,
/// which have no caller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    ChunkProduced {
        sequence_index: u64,
        size_bytes: usize,
    },
    ChunkConfirmed {
        sequence_index: u64,
    },
    ChunkUploadFailed {
        sequence_index: u64,
        error: ServiceError,
    },
    PauseNotifyFailed {
        error: ServiceError,
    },
    FinishFailed {
        error: ServiceError,
    },
    /// Finish succeeded; carries the session as last fetched
    Finalized {
        session: Session,
    },
}

/// Sending half of the event stream. Emission never blocks and
/// silently drops events once the receiver is gone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
