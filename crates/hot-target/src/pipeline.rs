//! Capture and processing threads around a single-slot frame buffer.
//!
//! The capture thread keeps overwriting the newest frame in a [`FrameSlot`];
//! the processing thread classifies each frame at most once and never waits
//! on the camera. When the consumer lags, frames are dropped, not queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hot_target_tracker::{FrameClassifier, FrameReport, KeyValueStore, ShapeExtractor};
use log::{debug, error, info, warn};

use crate::camera::FrameSource;

/// How to stop a running thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopMode {
    /// Finish the current read, then exit.
    Graceful,
    /// Also raise the abort flag so an in-flight read gives up.
    Forced,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("capture thread panicked and took its frame source with it")]
    SourceLost,
}

struct SlotState<F> {
    frame: Option<Arc<F>>,
    seq: u64,
    taken: bool,
}

/// Latest-frame slot shared by one producer and one consumer.
///
/// Frames carry a sequence number starting at 1. The lock is only held to
/// swap or clone an `Arc`.
pub struct FrameSlot<F> {
    state: Mutex<SlotState<F>>,
    dropped: AtomicU64,
}

impl<F> Default for FrameSlot<F> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState {
                frame: None,
                seq: 0,
                taken: false,
            }),
            dropped: AtomicU64::new(0),
        }
    }
}

impl<F> FrameSlot<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the newest one and return its sequence number.
    pub fn publish(&self, frame: F) -> u64 {
        let frame = Arc::new(frame);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.frame.is_some() && !state.taken {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        state.frame = Some(frame);
        state.seq += 1;
        state.taken = false;
        state.seq
    }

    /// The newest frame if its sequence number is above `seen`.
    pub fn take_newer(&self, seen: u64) -> Option<(u64, Arc<F>)> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.seq <= seen {
            return None;
        }
        let frame = Arc::clone(state.frame.as_ref()?);
        state.taken = true;
        Some((state.seq, frame))
    }

    /// The newest frame regardless of whether it was taken.
    pub fn latest(&self) -> Option<Arc<F>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.frame.clone()
    }

    /// Frames overwritten before anyone took them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Timing of the capture and processing loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Pause after each frame read.
    pub frame_interval: Duration,
    /// Pause before reconnecting after a failed connect or a lost stream.
    pub reconnect_backoff: Duration,
    /// Processing loop poll interval.
    pub poll_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(1),
            reconnect_backoff: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Frames per second over fixed measurement windows.
#[derive(Debug)]
pub struct FpsCounter {
    window: Duration,
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

    pub fn new(now: Instant) -> Self {
        Self::with_window(now, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(now: Instant, window: Duration) -> Self {
        Self {
            window,
            window_start: now,
            frames: 0,
        }
    }

    /// Count a frame; returns the rate when a window completes.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

fn stop_requested(running: &AtomicBool, abort: &AtomicBool) -> bool {
    !running.load(Ordering::Acquire) || abort.load(Ordering::Acquire)
}

/// Sleep up to `total`, waking early once a stop is requested.
fn sleep_unless_stopped(total: Duration, running: &AtomicBool, abort: &AtomicBool) {
    const STEP: Duration = Duration::from_millis(5);
    let deadline = Instant::now() + total;
    loop {
        if stop_requested(running, abort) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(STEP.min(deadline - now));
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    slot: &FrameSlot<S::Frame>,
    running: &AtomicBool,
    abort: &AtomicBool,
    settings: PipelineSettings,
) -> S {
    debug!("capture thread started");
    while !stop_requested(running, abort) {
        match source.connect() {
            Ok(()) => {
                while !stop_requested(running, abort) {
                    match source.read_frame(abort) {
                        Ok(Some(frame)) => {
                            slot.publish(frame);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("camera stream lost: {e}");
                            break;
                        }
                    }
                    thread::sleep(settings.frame_interval);
                }
                source.release();
            }
            Err(e) => warn!("camera connect failed: {e}"),
        }
        sleep_unless_stopped(settings.reconnect_backoff, running, abort);
    }
    source.release();
    debug!("capture thread stopped");
    source
}

/// Owner of the capture thread; restartable because the thread hands its
/// source back when it exits.
pub struct CaptureThread<S: FrameSource> {
    source: Option<S>,
    handle: Option<JoinHandle<S>>,
    slot: Arc<FrameSlot<S::Frame>>,
    running: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    settings: PipelineSettings,
}

impl<S: FrameSource> CaptureThread<S> {
    pub fn new(source: S, slot: Arc<FrameSlot<S::Frame>>, settings: PipelineSettings) -> Self {
        Self {
            source: Some(source),
            handle: None,
            slot,
            running: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
            settings,
        }
    }

    pub fn slot(&self) -> &Arc<FrameSlot<S::Frame>> {
        &self.slot
    }

    /// Whether a capture thread exists and has not exited yet.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start capturing unless already running.
    ///
    /// A thread that was asked to stop but has not exited yet is asked to
    /// keep going instead; if it exits anyway, the next call restarts it.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.is_running() {
            if !self.abort.load(Ordering::Acquire) {
                self.running.store(true, Ordering::Release);
            }
            return Ok(());
        }
        self.join();
        let source = self.source.take().ok_or(PipelineError::SourceLost)?;

        self.abort.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        let slot = Arc::clone(&self.slot);
        let running = Arc::clone(&self.running);
        let abort = Arc::clone(&self.abort);
        let settings = self.settings;
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture_loop(source, &slot, &running, &abort, settings))
            .map_err(|source| PipelineError::Spawn {
                name: "capture",
                source,
            })?;
        info!("capture started");
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the thread to exit without waiting for it.
    pub fn request_stop(&self, mode: StopMode) {
        if self.handle.is_none() {
            return;
        }
        self.running.store(false, Ordering::Release);
        if mode == StopMode::Forced {
            self.abort.store(true, Ordering::Release);
        }
    }

    /// Join the thread if it already exited.
    pub fn reap(&mut self) {
        if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            self.join();
        }
    }

    /// Block until the thread exits and take the source back.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            Ok(source) => {
                self.source = Some(source);
                info!("capture stopped");
            }
            Err(_) => error!("capture thread panicked"),
        }
    }

    pub fn stop(&mut self, mode: StopMode) {
        self.request_stop(mode);
        self.join();
    }
}

impl<S: FrameSource> Drop for CaptureThread<S> {
    fn drop(&mut self) {
        self.stop(StopMode::Forced);
    }
}

#[derive(Default)]
struct Status {
    running: AtomicBool,
    forced: AtomicBool,
    latest: Mutex<Option<FrameReport>>,
    fps_bits: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl Status {
    fn stop_mode(&self) -> StopMode {
        if self.forced.load(Ordering::Acquire) {
            StopMode::Forced
        } else {
            StopMode::Graceful
        }
    }
}

fn processing_loop<Src, E, S>(
    mut capture: CaptureThread<Src>,
    extractor: E,
    mut classifier: FrameClassifier<S>,
    status: &Status,
    poll: Duration,
) where
    Src: FrameSource,
    E: ShapeExtractor<Frame = Src::Frame>,
    S: KeyValueStore + ?Sized,
{
    debug!("processing thread started");
    let slot = Arc::clone(capture.slot());
    let mut seen = 0;
    let mut fps = FpsCounter::new(Instant::now());
    let mut capture_broken = false;

    while status.running.load(Ordering::Acquire) {
        if classifier.table().is_camera_enabled() {
            if !capture_broken {
                if let Err(e) = capture.start() {
                    error!("cannot start capture: {e}");
                    capture_broken = true;
                }
            }
            if let Some((seq, frame)) = slot.take_newer(seen) {
                seen = seq;
                let now = Instant::now();
                match classifier.process_frame(&extractor, &*frame, now) {
                    Ok(report) => {
                        *status.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
                        status.processed.fetch_add(1, Ordering::Relaxed);
                        if let Some(rate) = fps.tick(now) {
                            status.fps_bits.store(rate.to_bits(), Ordering::Relaxed);
                        }
                    }
                    Err(e) => warn!("shape extraction failed: {e}"),
                }
                status.dropped.store(slot.dropped(), Ordering::Relaxed);
            }
        } else if capture.is_running() {
            capture.request_stop(StopMode::Graceful);
        } else {
            capture.reap();
        }
        thread::sleep(poll);
    }

    // Acquisition goes down first.
    capture.stop(status.stop_mode());
    debug!("processing thread stopped");
}

/// Live frame pipeline: a capture thread feeding a processing thread.
///
/// The processing thread starts and stops capture following the
/// `enable_camera` key, so the robot can pause acquisition. Dropping the
/// pipeline performs a forced shutdown.
pub struct FramePipeline {
    status: Arc<Status>,
    handle: Option<JoinHandle<()>>,
}

impl FramePipeline {
    /// Spawn the processing thread; capture starts from there once the
    /// camera is enabled.
    pub fn spawn<Src, E, S>(
        source: Src,
        extractor: E,
        classifier: FrameClassifier<S>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError>
    where
        Src: FrameSource,
        E: ShapeExtractor<Frame = Src::Frame> + Send + 'static,
        S: KeyValueStore + ?Sized + 'static,
    {
        let status = Arc::new(Status::default());
        status.running.store(true, Ordering::Release);

        let slot = Arc::new(FrameSlot::new());
        let capture = CaptureThread::new(source, slot, settings);
        let thread_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("processing".into())
            .spawn(move || {
                processing_loop(
                    capture,
                    extractor,
                    classifier,
                    &thread_status,
                    settings.poll_interval,
                )
            })
            .map_err(|source| PipelineError::Spawn {
                name: "processing",
                source,
            })?;
        Ok(Self {
            status,
            handle: Some(handle),
        })
    }

    /// Report of the most recently classified frame.
    pub fn latest_report(&self) -> Option<FrameReport> {
        self.status
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Processing rate over the last completed 500 ms window.
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.status.fps_bits.load(Ordering::Relaxed))
    }

    pub fn frames_processed(&self) -> u64 {
        self.status.processed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.status.dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop capture, then processing, and wait for both threads.
    pub fn shutdown(&mut self, mode: StopMode) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!("shutting down pipeline ({mode:?})");
        self.status
            .forced
            .store(mode == StopMode::Forced, Ordering::Release);
        self.status.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("processing thread panicked");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown(StopMode::Forced);
    }
}
