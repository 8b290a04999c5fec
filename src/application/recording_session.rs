//! Recording session controller
//!
//! Orchestrates one recording at a time: acquires the capture source,
//! creates the remote session, runs the chunk producer and upload
//! pipeline, and finalizes the session on stop.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};

use crate::domain::chunk::{Chunk, ChunkLedger};
use crate::domain::config::AppConfig;
use crate::domain::recording::Duration;
use crate::domain::session::{
    InvalidStateTransition, Lifecycle, LifecycleState, Session, SessionId, SessionStatus,
    Transition,
};

use super::chunk_producer::{ChunkProducer, ChunkSink};
use super::events::{EventSink, SessionEvent};
use super::ports::{CaptureConstraints, CaptureError, CaptureSource, ServiceError, SessionService};
use super::upload_pipeline::{lock, SharedLedger, UploadPipeline};

/// Errors surfaced by controller commands
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to create recording session: {0}")]
    SessionCreateFailed(#[source] ServiceError),

    #[error("Chunk {index} failed to upload: {source}")]
    ChunkUploadFailed {
        index: u64,
        #[source]
        source: ServiceError,
    },

    #[error("Recording paused locally, but the service was not notified: {0}")]
    PauseNotifyFailed(#[source] ServiceError),

    #[error("Recording stopped, but the service failed to finish it: {0}")]
    FinishFailed(#[source] ServiceError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

impl ControllerError {
    /// Fatal errors abort the command and leave the controller idle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::DeviceUnavailable(_) | Self::SessionCreateFailed(_)
        )
    }

    /// The error matching a failure event, if it is one
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::ChunkUploadFailed {
                sequence_index,
                error,
            } => Some(Self::ChunkUploadFailed {
                index: *sequence_index,
                source: error.clone(),
            }),
            SessionEvent::PauseNotifyFailed { error } => Some(Self::PauseNotifyFailed(error.clone())),
            SessionEvent::FinishFailed { error } => Some(Self::FinishFailed(error.clone())),
            _ => None,
        }
    }
}

impl From<CaptureError> for ControllerError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            CaptureError::DeviceUnavailable(msg) | CaptureError::CaptureFailed(msg) => {
                Self::DeviceUnavailable(msg)
            }
        }
    }
}

/// What a command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Duplicate or overlapping command; nothing changed
    Ignored { state: LifecycleState },
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        *self == Self::Applied
    }
}

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between chunks
    pub cadence: Duration,
    /// Upper bound on waiting for uploads before finish
    pub drain_timeout: Duration,
    /// Emit buffered audio as a last chunk on stop
    pub flush_on_stop: bool,
    pub constraints: CaptureConstraints,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::default_cadence(),
            drain_timeout: Duration::default_drain_timeout(),
            flush_on_stop: true,
            constraints: CaptureConstraints::default(),
        }
    }
}

impl From<&AppConfig> for ControllerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cadence: config.cadence_or_default(),
            drain_timeout: config.drain_timeout_or_default(),
            flush_on_stop: config.flush_on_stop_or_default(),
            constraints: CaptureConstraints {
                echo_cancellation: config.echo_cancellation_or_default(),
                noise_suppression: config.noise_suppression_or_default(),
            },
        }
    }
}

/// Snapshot of the current (or last) session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub state: LifecycleState,
    pub session: Option<Session>,
    pub chunks_produced: usize,
    pub confirmed: Vec<u64>,
    pub failed: Vec<u64>,
}

impl SessionSummary {
    /// Every produced chunk reached the service
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.confirmed.len() == self.chunks_produced
    }
}

struct Run<S: SessionService + ?Sized> {
    producer: ChunkProducer,
    pipeline: Arc<UploadPipeline<S>>,
}

struct Inner<S: SessionService + ?Sized> {
    lifecycle: Lifecycle,
    session: Option<Session>,
    ledger: SharedLedger,
    run: Option<Run<S>>,
}

/// Recording session controller.
///
/// Commands are serialized through a gate: a command issued while another
/// one is still running returns [`CommandOutcome::Ignored`]. The state lock
/// is a plain mutex held only for synchronous sections.
///
/// Dropping a `start` or `stop` future part way through unwinds it: the
/// device is released and the lifecycle lands on `Idle` or `Ended`.
pub struct RecordingSessionController<C, S>
where
    C: CaptureSource + ?Sized + 'static,
    S: SessionService + ?Sized + 'static,
{
    capture: Arc<C>,
    service: Arc<S>,
    config: ControllerConfig,
    gate: AsyncMutex<()>,
    inner: Mutex<Inner<S>>,
    events: EventSink,
}

impl<C, S> RecordingSessionController<C, S>
where
    C: CaptureSource + ?Sized + 'static,
    S: SessionService + ?Sized + 'static,
{
    /// Create an idle controller and the receiving end of its event stream
    pub fn new(
        capture: Arc<C>,
        service: Arc<S>,
        config: ControllerConfig,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = EventSink::channel();
        let controller = Self {
            capture,
            service,
            config,
            gate: AsyncMutex::new(()),
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::new(),
                session: None,
                ledger: Arc::new(Mutex::new(ChunkLedger::new())),
                run: None,
            }),
            events,
        };
        (controller, rx)
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner().lifecycle.state()
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner().session.clone()
    }

    pub async fn summary(&self) -> SessionSummary {
        let inner = self.inner();
        let ledger = lock(&inner.ledger);
        SessionSummary {
            state: inner.lifecycle.state(),
            session: inner.session.clone(),
            chunks_produced: ledger.produced_count(),
            confirmed: ledger.confirmed_indices(),
            failed: ledger.failed_indices(),
        }
    }

    /// Acquire the microphone, create the remote session and start
    /// producing chunks. A no-op unless idle.
    pub async fn start(&self) -> Result<CommandOutcome, ControllerError> {
        let Some(_command) = self.enter() else {
            return Ok(self.ignored().await);
        };

        {
            let mut inner = self.inner();
            if inner.lifecycle.begin_start() == Transition::Ignored {
                return Ok(CommandOutcome::Ignored {
                    state: inner.lifecycle.state(),
                });
            }
        }
        self.state_changed(LifecycleState::Idle, LifecycleState::Starting);
        let rollback = OnDrop::new(|| {
            self.capture.release();
            self.abort_start();
        });

        if let Err(e) = self.capture.acquire(&self.config.constraints).await {
            warn!(error = %e, "capture acquisition failed");
            return Err(e.into());
        }

        let mut session = match self.service.create_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session creation failed");
                return Err(ControllerError::SessionCreateFailed(e));
            }
        };
        advance_status(&mut session, SessionStatus::Active);
        info!(session = %session.id(), "recording started");

        let ledger: SharedLedger = Arc::new(Mutex::new(ChunkLedger::new()));
        let pipeline = Arc::new(UploadPipeline::new(
            session.id().clone(),
            Arc::clone(&self.service),
            Arc::clone(&ledger),
            self.events.clone(),
        ));
        let producer = ChunkProducer::spawn(
            Arc::clone(&self.capture),
            self.config.cadence,
            self.config.flush_on_stop,
            self.chunk_sink(&ledger, &pipeline),
        );

        {
            let mut inner = self.inner();
            inner.lifecycle.complete_start()?;
            inner.session = Some(session);
            inner.ledger = ledger;
            inner.run = Some(Run { producer, pipeline });
        }
        rollback.disarm();
        self.state_changed(LifecycleState::Starting, LifecycleState::Active);
        Ok(CommandOutcome::Applied)
    }

    /// Suspend chunk production and capture, then tell the service.
    ///
    /// If the notification fails the recording stays paused locally and
    /// the failure is both returned and emitted.
    pub async fn pause(&self) -> Result<CommandOutcome, ControllerError> {
        let Some(_command) = self.enter() else {
            return Ok(self.ignored().await);
        };

        let session_id = {
            let mut inner = self.inner();
            if inner.lifecycle.pause()? == Transition::Ignored {
                return Ok(CommandOutcome::Ignored {
                    state: inner.lifecycle.state(),
                });
            }
            if let Some(run) = &inner.run {
                run.producer.pause();
            }
            self.capture.suspend();
            inner.session.as_mut().map(|session| {
                advance_status(session, SessionStatus::Paused);
                session.id().clone()
            })
        };
        self.state_changed(LifecycleState::Active, LifecycleState::Paused);
        info!("recording paused");

        let Some(session_id) = session_id else {
            return Ok(CommandOutcome::Applied);
        };
        match self.service.pause_session(&session_id).await {
            Ok(()) => Ok(CommandOutcome::Applied),
            Err(e) => {
                warn!(error = %e, "pause notification failed");
                self.events
                    .emit(SessionEvent::PauseNotifyFailed { error: e.clone() });
                Err(ControllerError::PauseNotifyFailed(e))
            }
        }
    }

    /// Resume capture and chunk production. No remote call is made.
    pub async fn resume(&self) -> Result<CommandOutcome, ControllerError> {
        let Some(_command) = self.enter() else {
            return Ok(self.ignored().await);
        };

        {
            let mut inner = self.inner();
            if inner.lifecycle.resume()? == Transition::Ignored {
                return Ok(CommandOutcome::Ignored {
                    state: inner.lifecycle.state(),
                });
            }
            self.capture.resume();
            if let Some(run) = &inner.run {
                run.producer.resume();
            }
            if let Some(session) = inner.session.as_mut() {
                advance_status(session, SessionStatus::Active);
            }
        }
        self.state_changed(LifecycleState::Paused, LifecycleState::Active);
        info!("recording resumed");
        Ok(CommandOutcome::Applied)
    }

    /// Stop producing, release the microphone, drain uploads and finish
    /// the session.
    ///
    /// The device is released and the state reaches `Ended` whatever the
    /// network does; a failed finish is returned as
    /// [`ControllerError::FinishFailed`].
    pub async fn stop(&self) -> Result<CommandOutcome, ControllerError> {
        let Some(_command) = self.enter() else {
            return Ok(self.ignored().await);
        };

        let (from, run, session_id) = {
            let mut inner = self.inner();
            let from = inner.lifecycle.state();
            if inner.lifecycle.begin_stop()? == Transition::Ignored {
                return Ok(CommandOutcome::Ignored { state: from });
            }
            let session_id = inner.session.as_ref().map(|s| s.id().clone());
            (from, inner.run.take(), session_id)
        };
        self.state_changed(from, LifecycleState::Stopping);
        let unwind = OnDrop::new(|| self.abandon_stop());

        let pipeline = match run {
            Some(Run { producer, pipeline }) => {
                let emitted = producer.stop().await;
                debug!(emitted, "producer halted");
                Some(pipeline)
            }
            None => None,
        };
        self.capture.release();

        if let Some(pipeline) = pipeline {
            let report = pipeline.drain(self.config.drain_timeout).await;
            debug!(
                completed = report.completed,
                abandoned = report.abandoned,
                "uploads drained"
            );
        }

        let finish = match &session_id {
            Some(id) => self.finish_remote(id).await,
            None => Ok(None),
        };

        let finalized = {
            let mut inner = self.inner();
            inner.lifecycle.complete_stop()?;
            if let Some(session) = inner.session.as_mut() {
                advance_status(session, SessionStatus::Ended);
                if let Ok(Some(remote)) = &finish {
                    if !session.absorb_remote(remote.clone()) {
                        warn!(session = %session.id(), "fetched session has a different id");
                    }
                }
            }
            inner.session.clone()
        };
        unwind.disarm();
        self.state_changed(LifecycleState::Stopping, LifecycleState::Ended);

        match finish {
            Ok(_) => {
                info!("recording finished");
                if let Some(session) = finalized {
                    self.events.emit(SessionEvent::Finalized { session });
                }
                Ok(CommandOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "finish failed");
                self.events
                    .emit(SessionEvent::FinishFailed { error: e.clone() });
                Err(ControllerError::FinishFailed(e))
            }
        }
    }

    /// Forget the ended session and return to idle
    pub async fn release(&self) -> Result<CommandOutcome, ControllerError> {
        let Some(_command) = self.enter() else {
            return Ok(self.ignored().await);
        };

        {
            let mut inner = self.inner();
            inner.lifecycle.release()?;
            inner.session = None;
            inner.ledger = Arc::new(Mutex::new(ChunkLedger::new()));
        }
        self.state_changed(LifecycleState::Ended, LifecycleState::Idle);
        Ok(CommandOutcome::Applied)
    }

    /// Finish the session, then fetch it for the transcription.
    /// A failed fetch is logged; only the finish result matters.
    async fn finish_remote(&self, id: &SessionId) -> Result<Option<Session>, ServiceError> {
        self.service.finish_session(id).await?;
        match self.service.get_session(id).await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "failed to fetch finished session");
                Ok(None)
            }
        }
    }

    fn chunk_sink(&self, ledger: &SharedLedger, pipeline: &Arc<UploadPipeline<S>>) -> ChunkSink {
        let ledger = Arc::clone(ledger);
        let pipeline = Arc::clone(pipeline);
        let events = self.events.clone();
        Arc::new(move |chunk: Chunk| {
            let sequence_index = chunk.sequence_index();
            let size_bytes = chunk.size_bytes();
            if !lock(&ledger).record(chunk) {
                warn!(index = sequence_index, "duplicate chunk index dropped");
                return;
            }
            events.emit(SessionEvent::ChunkProduced {
                sequence_index,
                size_bytes,
            });
            pipeline.submit(sequence_index);
        })
    }

    fn abort_start(&self) {
        let aborted = self.inner().lifecycle.abort_start().is_ok();
        if aborted {
            self.state_changed(LifecycleState::Starting, LifecycleState::Idle);
        }
    }

    /// End a stop that never reached its last step.
    ///
    /// Unsettled chunks are marked failed and the finish call is handed to
    /// a detached task when a runtime is still around.
    fn abandon_stop(&self) {
        if self.capture.is_active() {
            self.capture.release();
        }

        let session_id = {
            let mut inner = self.inner();
            if inner.lifecycle.complete_stop().is_err() {
                return;
            }
            {
                let mut ledger = lock(&inner.ledger);
                for index in ledger.outstanding_indices() {
                    ledger.fail(index);
                }
            }
            inner.session.as_mut().map(|session| {
                advance_status(session, SessionStatus::Ended);
                session.id().clone()
            })
        };
        warn!("stop interrupted, session ended locally");
        self.state_changed(LifecycleState::Stopping, LifecycleState::Ended);

        let (Some(id), Ok(runtime)) = (session_id, Handle::try_current()) else {
            return;
        };
        let service = Arc::clone(&self.service);
        runtime.spawn(async move {
            if let Err(e) = service.finish_session(&id).await {
                warn!(session = %id, error = %e, "finish after interrupted stop failed");
            }
        });
    }

    fn inner(&self) -> MutexGuard<'_, Inner<S>> {
        lock(&self.inner)
    }

    fn enter(&self) -> Option<AsyncMutexGuard<'_, ()>> {
        let guard = self.gate.try_lock().ok();
        if guard.is_none() {
            debug!("command ignored, another command is in progress");
        }
        guard
    }

    async fn ignored(&self) -> CommandOutcome {
        CommandOutcome::Ignored {
            state: self.state().await,
        }
    }

    fn state_changed(&self, from: LifecycleState, to: LifecycleState) {
        debug!(%from, %to, "lifecycle transition");
        self.events.emit(SessionEvent::StateChanged { from, to });
    }
}

/// Runs its action on drop unless disarmed first
struct OnDrop<F: FnOnce()> {
    action: Option<F>,
}

impl<F: FnOnce()> OnDrop<F> {
    fn new(action: F) -> Self {
        Self {
            action: Some(action),
        }
    }

    fn disarm(mut self) {
        self.action = None;
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

/// Move the local session copy along its status path, tolerating a
/// service that already reports the target status
fn advance_status(session: &mut Session, next: SessionStatus) {
    if session.status() == next {
        return;
    }
    if let Err(e) = session.transition(next) {
        warn!(error = %e, "session status not updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::{AudioData, AudioMimeType};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Capture source that returns a fixed segment on every take
    struct MockCapture {
        fail_with: Option<CaptureError>,
        active: AtomicBool,
        suspended: AtomicBool,
        acquisitions: AtomicUsize,
        releases: AtomicUsize,
    }

    impl MockCapture {
        fn new() -> Arc<Self> {
            Self::build(None)
        }

        fn failing(error: CaptureError) -> Arc<Self> {
            Self::build(Some(error))
        }

        fn build(fail_with: Option<CaptureError>) -> Arc<Self> {
            Arc::new(Self {
                fail_with,
                active: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                acquisitions: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CaptureSource for MockCapture {
        async fn acquire(&self, _constraints: &CaptureConstraints) -> Result<(), CaptureError> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn suspend(&self) {
            self.suspended.store(true, Ordering::SeqCst);
        }

        fn resume(&self) {
            self.suspended.store(false, Ordering::SeqCst);
        }

        async fn take_segment(&self) -> Result<Option<AudioData>, CaptureError> {
            if !self.active.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(AudioData::new(vec![9u8; 64], AudioMimeType::Flac)))
        }

        fn release(&self) {
            self.active.store(false, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MockService {
        failing_chunks: HashSet<u64>,
        fail_create: bool,
        fail_pause: bool,
        fail_finish: bool,
        /// The next create or finish call hangs for a minute
        stall_create: AtomicBool,
        stall_finish: AtomicBool,
        created: AtomicUsize,
        uploads: Mutex<Vec<u64>>,
        pauses: AtomicUsize,
        finishes: AtomicUsize,
    }

    impl MockService {
        fn uploads(&self) -> Vec<u64> {
            self.uploads.lock().unwrap().clone()
        }
    }

    fn service_error() -> ServiceError {
        ServiceError::Api {
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[async_trait]
    impl SessionService for MockService {
        async fn create_session(&self) -> Result<Session, ServiceError> {
            if self.stall_create.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }
            if self.fail_create {
                return Err(service_error());
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Session::new(SessionId::new(format!("rec-{n}")), Utc::now()))
        }

        async fn upload_chunk(
            &self,
            _id: &SessionId,
            sequence_index: u64,
            _audio: &AudioData,
        ) -> Result<(), ServiceError> {
            self.uploads.lock().unwrap().push(sequence_index);
            if self.failing_chunks.contains(&sequence_index) {
                return Err(service_error());
            }
            Ok(())
        }

        async fn pause_session(&self, _id: &SessionId) -> Result<(), ServiceError> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            if self.fail_pause {
                return Err(ServiceError::RequestFailed("offline".to_string()));
            }
            Ok(())
        }

        async fn finish_session(&self, _id: &SessionId) -> Result<(), ServiceError> {
            self.finishes.fetch_add(1, Ordering::SeqCst);
            if self.stall_finish.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }
            if self.fail_finish {
                return Err(service_error());
            }
            Ok(())
        }

        async fn get_session(&self, id: &SessionId) -> Result<Session, ServiceError> {
            let raw = format!(
                r#"{{"id":"{id}","status":"ended","created_at":"2024-05-01T10:00:00","transcription_text":"hello world"}}"#
            );
            serde_json::from_str(&raw).map_err(|e| ServiceError::ParseError(e.to_string()))
        }

        async fn list_sessions(&self) -> Result<Vec<Session>, ServiceError> {
            Ok(Vec::new())
        }
    }

    type Controller = RecordingSessionController<MockCapture, MockService>;

    fn config() -> ControllerConfig {
        ControllerConfig {
            cadence: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
            flush_on_stop: false,
            constraints: CaptureConstraints::default(),
        }
    }

    fn controller(
        capture: &Arc<MockCapture>,
        service: &Arc<MockService>,
    ) -> (Controller, UnboundedReceiver<SessionEvent>) {
        RecordingSessionController::new(Arc::clone(capture), Arc::clone(service), config())
    }

    async fn ticks(n: u64) {
        tokio::time::sleep(std::time::Duration::from_secs(10 * n + 1)).await;
    }

    fn drain_events(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_with_pause_and_resume() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, mut rx) = controller(&capture, &service);

        assert!(controller.start().await.unwrap().is_applied());
        assert_eq!(controller.state().await, LifecycleState::Active);
        ticks(2).await;

        controller.pause().await.unwrap();
        assert_eq!(controller.state().await, LifecycleState::Paused);
        assert!(capture.suspended.load(Ordering::SeqCst));
        ticks(3).await;

        controller.resume().await.unwrap();
        ticks(1).await;
        controller.stop().await.unwrap();

        assert_eq!(controller.state().await, LifecycleState::Ended);
        let summary = controller.summary().await;
        assert_eq!(summary.confirmed, vec![0, 1, 2]);
        assert!(summary.is_complete());
        assert_eq!(service.created.load(Ordering::SeqCst), 1);
        assert_eq!(service.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(service.finishes.load(Ordering::SeqCst), 1);
        assert!(!capture.is_active());

        let session = summary.session.unwrap();
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.transcription(), Some("hello world"));

        let events = drain_events(&mut rx);
        assert!(matches!(events.last(), Some(SessionEvent::Finalized { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_active_is_a_no_op() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        let outcome = controller.start().await.unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Ignored {
                state: LifecycleState::Active
            }
        );
        assert_eq!(service.created.load(Ordering::SeqCst), 1);
        assert_eq!(capture.acquisitions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn device_unavailable_returns_to_idle() {
        let capture = MockCapture::failing(CaptureError::DeviceUnavailable("no mic".to_string()));
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, ControllerError::DeviceUnavailable(_)));
        assert!(err.is_fatal());
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert_eq!(service.created.load(Ordering::SeqCst), 0);
        ticks(3).await;
        assert!(service.uploads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_surfaced() {
        let capture = MockCapture::failing(CaptureError::PermissionDenied("blocked".to_string()));
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::PermissionDenied(_)));
        assert_eq!(controller.state().await, LifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_releases_device() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService {
            fail_create: true,
            ..Default::default()
        });
        let (controller, _rx) = controller(&capture, &service);

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, ControllerError::SessionCreateFailed(_)));
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert!(!capture.is_active());
        assert_eq!(capture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_from_idle_is_rejected() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        let err = controller.pause().await.unwrap_err();

        assert!(matches!(err, ControllerError::InvalidState(_)));
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert_eq!(service.pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chunk_is_isolated() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService {
            failing_chunks: [3].into_iter().collect(),
            ..Default::default()
        });
        let (controller, mut rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        ticks(5).await;
        controller.stop().await.unwrap();

        assert_eq!(controller.state().await, LifecycleState::Ended);
        let summary = controller.summary().await;
        assert_eq!(summary.confirmed, vec![0, 1, 2, 4]);
        assert_eq!(summary.failed, vec![3]);
        assert!(!summary.is_complete());

        let failed: Vec<u64> = drain_events(&mut rx)
            .iter()
            .filter_map(|event| match event {
                SessionEvent::ChunkUploadFailed { sequence_index, .. } => Some(*sequence_index),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_failure_still_ends_and_releases() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService {
            fail_finish: true,
            ..Default::default()
        });
        let (controller, mut rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        ticks(1).await;
        let err = controller.stop().await.unwrap_err();

        assert!(matches!(err, ControllerError::FinishFailed(_)));
        assert!(!err.is_fatal());
        assert_eq!(controller.state().await, LifecycleState::Ended);
        assert!(!capture.is_active());
        assert!(controller.session().await.unwrap().transcription().is_none());
        assert!(drain_events(&mut rx)
            .iter()
            .any(|event| matches!(event, SessionEvent::FinishFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_start_releases_device_and_returns_to_idle() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService {
            stall_create: AtomicBool::new(true),
            ..Default::default()
        });
        let (controller, _rx) = controller(&capture, &service);

        let attempt =
            tokio::time::timeout(std::time::Duration::from_secs(5), controller.start()).await;
        assert!(attempt.is_err());
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert!(!capture.is_active());
        assert_eq!(capture.releases.load(Ordering::SeqCst), 1);

        assert!(controller.start().await.unwrap().is_applied());
        assert_eq!(controller.state().await, LifecycleState::Active);
        assert_eq!(capture.acquisitions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_stop_still_ends_and_finishes_in_background() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        ticks(1).await;
        service.stall_finish.store(true, Ordering::SeqCst);

        let attempt =
            tokio::time::timeout(std::time::Duration::from_secs(5), controller.stop()).await;
        assert!(attempt.is_err());
        assert_eq!(controller.state().await, LifecycleState::Ended);
        assert!(!capture.is_active());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(service.finishes.load(Ordering::SeqCst), 2);
        assert!(controller.release().await.unwrap().is_applied());
        assert!(controller.start().await.unwrap().is_applied());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_notify_failure_keeps_local_pause_and_finish_still_runs() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService {
            fail_pause: true,
            ..Default::default()
        });
        let (controller, mut rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        let err = controller.pause().await.unwrap_err();

        assert!(matches!(err, ControllerError::PauseNotifyFailed(_)));
        assert_eq!(controller.state().await, LifecycleState::Paused);
        assert!(drain_events(&mut rx)
            .iter()
            .any(|event| matches!(event, SessionEvent::PauseNotifyFailed { .. })));

        controller.stop().await.unwrap();
        assert_eq!(service.finishes.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state().await, LifecycleState::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_flushes_residual_audio() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = RecordingSessionController::new(
            Arc::clone(&capture),
            Arc::clone(&service),
            ControllerConfig {
                flush_on_stop: true,
                ..config()
            },
        );

        controller.start().await.unwrap();
        ticks(1).await;
        controller.stop().await.unwrap();

        assert_eq!(controller.summary().await.confirmed, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn release_allows_a_new_session() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        ticks(1).await;
        controller.stop().await.unwrap();
        assert!(controller.start().await.unwrap() != CommandOutcome::Applied);

        controller.release().await.unwrap();
        assert_eq!(controller.state().await, LifecycleState::Idle);
        assert!(controller.session().await.is_none());

        controller.start().await.unwrap();
        ticks(1).await;
        assert_eq!(service.created.load(Ordering::SeqCst), 2);
        let summary = controller.summary().await;
        assert_eq!(summary.confirmed, vec![0]);
        assert_eq!(summary.session.unwrap().id().as_str(), "rec-1");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_command_is_ignored() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, _rx) = controller(&capture, &service);

        let (first, second) = tokio::join!(controller.start(), controller.start());

        assert!(first.unwrap().is_applied());
        assert!(!second.unwrap().is_applied());
        assert_eq!(service.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_report_state_changes_in_order() {
        let capture = MockCapture::new();
        let service = Arc::new(MockService::default());
        let (controller, mut rx) = controller(&capture, &service);

        controller.start().await.unwrap();
        controller.stop().await.unwrap();

        let transitions: Vec<(LifecycleState, LifecycleState)> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::StateChanged { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (LifecycleState::Idle, LifecycleState::Starting),
                (LifecycleState::Starting, LifecycleState::Active),
                (LifecycleState::Active, LifecycleState::Stopping),
                (LifecycleState::Stopping, LifecycleState::Ended),
            ]
        );
    }

    #[test]
    fn controller_config_from_app_config() {
        let app = AppConfig {
            cadence: Some("5s".to_string()),
            flush_on_stop: Some(false),
            ..Default::default()
        };
        let config = ControllerConfig::from(&app);
        assert_eq!(config.cadence.as_secs(), 5);
        assert!(!config.flush_on_stop);
        assert!(config.constraints.noise_suppression);
    }
}
