//! Microphone capture using cpal
//!
//! The input stream lives on a dedicated thread because `cpal::Stream` is
//! not `Send`. The driver callback only appends mono samples to a shared
//! buffer; segments are cut, resampled to 16 kHz and FLAC-encoded on a
//! blocking task when the chunk producer asks for them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex as StdMutex, MutexGuard};
use std::thread;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::flac_encoder::{encode_segment, TARGET_SAMPLE_RATE};
use crate::application::ports::{CaptureConstraints, CaptureError, CaptureSource};
use crate::domain::recording::{AudioData, AudioMimeType};

/// 20 ms at the target rate
const GATE_BLOCK: usize = (TARGET_SAMPLE_RATE / 50) as usize;

/// Blocks quieter than this RMS are zeroed when noise suppression is on
const GATE_THRESHOLD_RMS: f64 = 200.0;

type Opened = Result<u32, CaptureError>;

/// Thread owning one open input stream.
///
/// The stream is dropped on that thread once the shutdown channel fires or
/// its sender goes away; [`StreamThread::close`] waits for that.
struct StreamThread {
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl StreamThread {
    /// Run `open` on a new thread and keep its stream there until closed.
    /// The receiver yields the stream's sample rate or the open error.
    fn spawn<T, F>(open: F) -> Result<(Self, oneshot::Receiver<Opened>), CaptureError>
    where
        T: 'static,
        F: FnOnce() -> Result<(T, u32), CaptureError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown, shutdown_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("audio-input".to_string())
            .spawn(move || {
                let (stream, rate) = match open() {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(rate)).is_ok() {
                    let _ = shutdown_rx.recv();
                }
                drop(stream);
                debug!("input stream closed");
            })
            .map_err(|e| CaptureError::CaptureFailed(format!("capture thread failed to start: {e}")))?;

        Ok((Self { shutdown, handle }, ready_rx))
    }

    fn close(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            warn!("capture thread panicked");
        }
    }
}

/// cpal-backed [`CaptureSource`]
pub struct CpalCapture {
    /// Mono samples at the device rate since the last segment
    buffer: Arc<StdMutex<Vec<i16>>>,
    device_sample_rate: Arc<AtomicU32>,
    /// Present while the device is open
    stream: StdMutex<Option<StreamThread>>,
    /// Callback appends samples while set; cleared by `suspend`
    buffering: Arc<AtomicBool>,
    noise_gate: AtomicBool,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(StdMutex::new(Vec::new())),
            device_sample_rate: Arc::new(AtomicU32::new(0)),
            stream: StdMutex::new(None),
            buffering: Arc::new(AtomicBool::new(false)),
            noise_gate: AtomicBool::new(true),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<i16>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stream(&self) -> MutexGuard<'_, Option<StreamThread>> {
        self.stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn input_device() -> Result<cpal::Device, CaptureError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".to_string()))
    }

    /// Pick an i16/f32 config, preferring fewer channels and one that
    /// covers the target rate
    fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| classify(e.to_string()))?;

        let covers_target = |range: &cpal::SupportedStreamConfigRange| {
            range.min_sample_rate().0 <= TARGET_SAMPLE_RATE
                && range.max_sample_rate().0 >= TARGET_SAMPLE_RATE
        };

        let range = supported
            .filter(|range| matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32))
            .min_by_key(|range| (!covers_target(range), range.channels()))
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable("no supported input format".to_string())
            })?;

        let sample_rate = if covers_target(&range) {
            SampleRate(TARGET_SAMPLE_RATE)
        } else {
            range.min_sample_rate()
        };

        let config = StreamConfig {
            channels: range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, range.sample_format()))
    }

    /// Open the device and start the stream on the calling thread.
    /// Returns the stream and its sample rate.
    fn open_stream(
        buffer: Arc<StdMutex<Vec<i16>>>,
        buffering: Arc<AtomicBool>,
    ) -> Result<(cpal::Stream, u32), CaptureError> {
        let device = Self::input_device()?;
        let (config, sample_format) = Self::input_config(&device)?;
        let channels = config.channels;
        let on_error = |err: cpal::StreamError| warn!(error = %err, "audio stream error");

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if buffering.load(Ordering::Relaxed) {
                        append(&buffer, &downmix(data, channels));
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if buffering.load(Ordering::Relaxed) {
                        let pcm: Vec<i16> = data.iter().map(|&s| (s * 32767.0) as i16).collect();
                        append(&buffer, &downmix(&pcm, channels));
                    }
                },
                on_error,
                None,
            ),
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| classify(e.to_string()))?;

        stream.play().map_err(|e| classify(e.to_string()))?;
        Ok((stream, config.sample_rate.0))
    }

    /// Resample, gate and encode one segment
    fn encode(samples: &[i16], source_rate: u32, noise_gate: bool) -> Result<AudioData, CaptureError> {
        let mut pcm = resample_to_target(samples, source_rate)?;
        if noise_gate {
            apply_noise_gate(&mut pcm);
        }
        let flac = encode_segment(&pcm).map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok(AudioData::new(flac, AudioMimeType::Flac))
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl CaptureSource for CpalCapture {
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }

        self.noise_gate
            .store(constraints.noise_suppression, Ordering::SeqCst);
        if constraints.echo_cancellation {
            debug!("echo cancellation requested; left to the platform audio stack");
        }

        self.buffer().clear();
        self.buffering.store(true, Ordering::SeqCst);

        let buffer = Arc::clone(&self.buffer);
        let buffering = Arc::clone(&self.buffering);
        let (stream_thread, ready) = StreamThread::spawn(move || CpalCapture::open_stream(buffer, buffering))?;

        let opened = ready.await.unwrap_or_else(|_| {
            Err(CaptureError::CaptureFailed(
                "capture thread exited before the stream opened".to_string(),
            ))
        });

        match opened {
            Ok(rate) => {
                self.device_sample_rate.store(rate, Ordering::SeqCst);
                if let Some(stale) = self.stream().replace(stream_thread) {
                    stale.close();
                }
                info!(sample_rate = rate, "microphone acquired");
                Ok(())
            }
            Err(e) => {
                self.buffering.store(false, Ordering::SeqCst);
                stream_thread.close();
                Err(e)
            }
        }
    }

    fn suspend(&self) {
        self.buffering.store(false, Ordering::SeqCst);
    }

    fn resume(&self) {
        if self.is_active() {
            self.buffering.store(true, Ordering::SeqCst);
        }
    }

    async fn take_segment(&self) -> Result<Option<AudioData>, CaptureError> {
        let samples = std::mem::take(&mut *self.buffer());
        if samples.is_empty() {
            return Ok(None);
        }

        let rate = self.device_sample_rate.load(Ordering::SeqCst);
        if rate == 0 {
            return Err(CaptureError::CaptureFailed("sample rate unknown".to_string()));
        }
        let noise_gate = self.noise_gate.load(Ordering::SeqCst);

        let audio = tokio::task::spawn_blocking(move || Self::encode(&samples, rate, noise_gate))
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("encode task failed: {e}")))??;
        Ok(Some(audio))
    }

    /// Returns once the input stream is closed
    fn release(&self) {
        self.buffering.store(false, Ordering::SeqCst);
        let thread = self.stream().take();
        if let Some(thread) = thread {
            thread.close();
            info!("microphone released");
        }
        self.buffer().clear();
    }

    fn is_active(&self) -> bool {
        self.stream().is_some()
    }
}

fn append(buffer: &StdMutex<Vec<i16>>, samples: &[i16]) {
    if let Ok(mut buffer) = buffer.lock() {
        buffer.extend_from_slice(samples);
    }
}

/// Average interleaved frames down to one channel
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

fn resample_to_target(samples: &[i16], source_rate: u32) -> Result<Vec<i16>, CaptureError> {
    if source_rate == TARGET_SAMPLE_RATE {
        return Ok(samples.to_vec());
    }

    let input: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    let expected = (input.len() as f64 * f64::from(TARGET_SAMPLE_RATE) / f64::from(source_rate))
        .ceil() as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        TARGET_SAMPLE_RATE as usize,
        1024,
        2,
        1,
    )
    .map_err(|e| CaptureError::CaptureFailed(format!("resampler init failed: {e}")))?;

    let mut output = Vec::with_capacity(expected);
    for block in input.chunks(resampler.input_frames_next()) {
        let mut frames = block.to_vec();
        frames.resize(resampler.input_frames_next(), 0.0);
        let wave = vec![frames];
        let resampled = resampler
            .process(&wave, None)
            .map_err(|e| CaptureError::CaptureFailed(format!("resampling failed: {e}")))?;
        output.extend(resampled[0].iter().map(|&s| (s * 32767.0) as i16));
    }
    output.truncate(expected);
    Ok(output)
}

/// Zero out 20 ms blocks whose RMS falls under the gate threshold
fn apply_noise_gate(pcm: &mut [i16]) {
    for block in pcm.chunks_mut(GATE_BLOCK) {
        let energy: f64 = block.iter().map(|&s| f64::from(s).powi(2)).sum();
        let rms = (energy / block.len() as f64).sqrt();
        if rms < GATE_THRESHOLD_RMS {
            block.fill(0);
        }
    }
}

/// Sort a cpal error message into the capture error taxonomy
fn classify(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if ["permission", "denied", "not authorized", "not permitted"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CaptureError::PermissionDenied(message)
    } else if ["not available", "no longer available", "no such device", "disconnected", "busy"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CaptureError::DeviceUnavailable(message)
    } else {
        CaptureError::CaptureFailed(message)
    }
}
