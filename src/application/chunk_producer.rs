//! Timed slicing of captured audio into sequenced chunks

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::chunk::{Chunk, ChunkSequencer};
use crate::domain::recording::Duration;

use super::ports::CaptureSource;

/// Receives every chunk the producer emits, in index order
pub type ChunkSink = Arc<dyn Fn(Chunk) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerMode {
    Running,
    Paused,
    Stopped,
}

/// Background task that takes one segment from the capture source every
/// `cadence` and hands it to the sink as the next chunk.
///
/// One producer lives for a whole session, so its sequence counter
/// survives any number of pause/resume cycles.
pub struct ChunkProducer {
    control: watch::Sender<ProducerMode>,
    task: Option<JoinHandle<u64>>,
}

impl ChunkProducer {
    /// Spawn the producer. The first tick fires one `cadence` from now.
    pub fn spawn<C>(capture: Arc<C>, cadence: Duration, flush_on_stop: bool, sink: ChunkSink) -> Self
    where
        C: CaptureSource + ?Sized + 'static,
    {
        let (control, mode) = watch::channel(ProducerMode::Running);
        let task = tokio::spawn(run(capture, cadence, flush_on_stop, sink, mode));
        Self {
            control,
            task: Some(task),
        }
    }

    /// Stop ticking until [`ChunkProducer::resume`]
    pub fn pause(&self) {
        self.control.send_replace(ProducerMode::Paused);
    }

    /// Restart the cadence timer from now
    pub fn resume(&self) {
        self.control.send_replace(ProducerMode::Running);
    }

    /// Halt the timer and wait for the task to finish, including the
    /// residual flush. Returns the number of chunks emitted.
    pub async fn stop(mut self) -> u64 {
        self.control.send_replace(ProducerMode::Stopped);
        let Some(task) = self.task.take() else {
            return 0;
        };
        match task.await {
            Ok(emitted) => emitted,
            Err(e) => {
                warn!(error = %e, "chunk producer task ended abnormally");
                0
            }
        }
    }
}

impl Drop for ChunkProducer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<C>(
    capture: Arc<C>,
    cadence: Duration,
    flush_on_stop: bool,
    sink: ChunkSink,
    mut mode: watch::Receiver<ProducerMode>,
) -> u64
where
    C: CaptureSource + ?Sized,
{
    let period = cadence.as_std();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequencer = ChunkSequencer::new();

    loop {
        let current = *mode.borrow_and_update();
        match current {
            ProducerMode::Stopped => break,
            ProducerMode::Paused => {
                if mode.changed().await.is_err() {
                    break;
                }
                ticker.reset();
                continue;
            }
            ProducerMode::Running => {}
        }

        // A mode change ready alongside a tick wins, so no slice is cut
        // after pause or stop was requested
        tokio::select! {
            biased;
            changed = mode.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                emit_segment(capture.as_ref(), &mut sequencer, &sink).await;
            }
        }
    }

    if flush_on_stop {
        emit_segment(capture.as_ref(), &mut sequencer, &sink).await;
    }
    debug!(emitted = sequencer.issued(), "chunk producer stopped");
    sequencer.issued()
}

async fn emit_segment<C>(capture: &C, sequencer: &mut ChunkSequencer, sink: &ChunkSink)
where
    C: CaptureSource + ?Sized,
{
    let audio = match capture.take_segment().await {
        Ok(Some(audio)) => audio,
        Ok(None) => {
            debug!("no audio captured this tick");
            return;
        }
        Err(e) => {
            warn!(error = %e, "failed to take audio segment");
            return;
        }
    };

    // The index is only claimed once the payload is known to be non-empty
    match Chunk::new(sequencer.issued(), audio) {
        Ok(chunk) => {
            sequencer.advance();
            debug!(
                index = chunk.sequence_index(),
                bytes = chunk.size_bytes(),
                "chunk produced"
            );
            sink(chunk);
        }
        Err(e) => debug!(error = %e, "dropping empty segment"),
    }
}
