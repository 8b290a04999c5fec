//! Concurrent chunk uploads for one session

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::chunk::ChunkLedger;
use crate::domain::recording::Duration;
use crate::domain::session::SessionId;

use super::events::{EventSink, SessionEvent};
use super::ports::{ServiceError, SessionService};

/// Shared chunk ledger. Only held for short synchronous sections.
pub type SharedLedger = Arc<Mutex<ChunkLedger>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outcome of [`UploadPipeline::drain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Uploads that settled while draining
    pub completed: usize,
    /// Uploads abandoned at the deadline
    pub abandoned: usize,
}

/// Issues one upload per chunk, in submission order, without waiting for
/// earlier uploads to complete.
///
/// Every outcome is written back to the ledger: success confirms the chunk
/// and frees its payload, failure marks it failed and emits
/// [`SessionEvent::ChunkUploadFailed`]. Nothing is retried.
pub struct UploadPipeline<S: SessionService + ?Sized> {
    session_id: SessionId,
    service: Arc<S>,
    ledger: SharedLedger,
    events: EventSink,
    uploads: Mutex<JoinSet<()>>,
}

impl<S> UploadPipeline<S>
where
    S: SessionService + ?Sized + 'static,
{
    pub fn new(session_id: SessionId, service: Arc<S>, ledger: SharedLedger, events: EventSink) -> Self {
        Self {
            session_id,
            service,
            ledger,
            events,
            uploads: Mutex::new(JoinSet::new()),
        }
    }

    /// Start uploading a recorded chunk. Must be called from within the runtime.
    pub fn submit(&self, sequence_index: u64) {
        let Some(audio) = lock(&self.ledger).begin_upload(sequence_index) else {
            debug!(index = sequence_index, "chunk not pending, skipping upload");
            return;
        };

        let session_id = self.session_id.clone();
        let service = Arc::clone(&self.service);
        let ledger = Arc::clone(&self.ledger);
        let events = self.events.clone();

        let mut uploads = lock(&self.uploads);
        while let Some(finished) = uploads.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "upload task ended abnormally");
            }
        }
        uploads.spawn(async move {
            let outcome = service.upload_chunk(&session_id, sequence_index, &audio).await;
            drop(audio);
            settle(&ledger, &events, sequence_index, outcome);
        });
    }

    /// Number of uploads not yet reaped
    pub fn in_flight(&self) -> usize {
        lock(&self.uploads).len()
    }

    /// Wait for outstanding uploads, giving up after `timeout`.
    ///
    /// Uploads still running at the deadline are aborted, and every chunk
    /// left unsettled is marked failed.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let mut uploads = std::mem::take(&mut *lock(&self.uploads));
        let mut completed = 0;

        let waited = tokio::time::timeout(timeout.as_std(), async {
            while let Some(finished) = uploads.join_next().await {
                completed += 1;
                if let Err(e) = finished {
                    warn!(error = %e, "upload task ended abnormally");
                }
            }
        })
        .await;

        if waited.is_err() {
            warn!(remaining = uploads.len(), "drain timeout reached, aborting uploads");
            uploads.shutdown().await;
        }

        let unsettled = lock(&self.ledger).outstanding_indices();
        for &index in &unsettled {
            settle(
                &self.ledger,
                &self.events,
                index,
                Err(ServiceError::RequestFailed(format!(
                    "upload did not complete within {timeout}"
                ))),
            );
        }

        DrainReport {
            completed,
            abandoned: unsettled.len(),
        }
    }
}

fn settle(ledger: &SharedLedger, events: &EventSink, index: u64, outcome: Result<(), ServiceError>) {
    match outcome {
        Ok(()) => {
            if lock(ledger).confirm(index) {
                debug!(index, "chunk confirmed");
                events.emit(SessionEvent::ChunkConfirmed {
                    sequence_index: index,
                });
            }
        }
        Err(error) => {
            if lock(ledger).fail(index) {
                warn!(index, error = %error, "chunk upload failed");
                events.emit(SessionEvent::ChunkUploadFailed {
                    sequence_index: index,
                    error,
                });
            }
        }
    }
}
