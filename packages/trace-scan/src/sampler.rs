// Fixed-cadence frame sampler
//
// Pulls the current video frame into an off-screen buffer on every tick and
// hands it to a `FrameSink`. Back-pressure is skip-on-busy: while a
// `DecodePermit` is outstanding, ticks are counted and dropped instead of
// queued, so at most one decode is ever in flight.
//
// `stop()` closes the dispatch gate under the same lock the tick holds while
// dispatching, so once it returns no further `on_frame` call can start.

use crate::error::ScanError;
use crate::frame::{Frame, PixelBuffer};
use crate::stream::SharedStream;
use crate::device::ReadyState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Receiver of sampled frames
///
/// Both methods are called from the sampler task and must not block or call
/// back into `FrameSampler::stop` synchronously; hand work off to a task.
pub trait FrameSink: Send + Sync {
    /// A frame is ready. The decode slot stays busy until `permit` is dropped.
    fn on_frame(&self, frame: Frame, permit: DecodePermit);

    /// The stream died underneath the sampler. The sampler has already stopped ticking.
    fn on_stream_lost(&self, error: ScanError);
}

/// The single decode slot of a session
///
/// Outlives individual sampler runs, so a decode started before a restart
/// still blocks the next run's ticks until it finishes.
#[derive(Debug, Clone, Default)]
pub struct DecodeSlot {
    busy: Arc<AtomicBool>,
}

impl DecodeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Take the slot, or `None` while a decode is outstanding.
    pub fn try_acquire(&self) -> Option<DecodePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DecodePermit {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Marks the decode slot as busy until dropped
#[derive(Debug)]
pub struct DecodePermit {
    busy: Arc<AtomicBool>,
}

impl Drop for DecodePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Live counters of one sampler run
#[derive(Debug, Default)]
pub struct SamplerStats {
    ticks: AtomicU64,
    frames_sampled: AtomicU64,
    skipped_busy: AtomicU64,
    skipped_not_ready: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerCounts {
    pub ticks: u64,
    pub frames_sampled: u64,
    pub skipped_busy: u64,
    pub skipped_not_ready: u64,
}

impl SamplerStats {
    pub fn snapshot(&self) -> SamplerCounts {
        SamplerCounts {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_sampled: self.frames_sampled.load(Ordering::Relaxed),
            skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
            skipped_not_ready: self.skipped_not_ready.load(Ordering::Relaxed),
        }
    }
}

enum Sample {
    NotReady,
    Frame(Frame),
    Lost(ScanError),
}

pub struct FrameSampler {
    cancel_token: CancellationToken,
    dispatch_open: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
    stats: Arc<SamplerStats>,
}

impl FrameSampler {
    /// Start sampling `stream` every `interval`, dispatching only while `slot`
    /// is free. Must be called inside a tokio runtime.
    pub fn start(
        stream: SharedStream,
        interval: Duration,
        slot: DecodeSlot,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let dispatch_open = Arc::new(Mutex::new(true));
        let stats = Arc::new(SamplerStats::default());

        let task = tokio::spawn(run(
            stream,
            interval,
            slot,
            sink,
            cancel_token.clone(),
            Arc::clone(&dispatch_open),
            Arc::clone(&stats),
        ));

        log::debug!("Frame sampler started ({:?} cadence)", interval);

        Self {
            cancel_token,
            dispatch_open,
            task: Some(task),
            stats,
        }
    }

    /// Stop sampling. Idempotent; no `on_frame` call begins after this returns.
    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        *self.dispatch_open.lock() = false;
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("Frame sampler stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    stream: SharedStream,
    interval: Duration,
    slot: DecodeSlot,
    sink: Arc<dyn FrameSink>,
    cancel_token: CancellationToken,
    dispatch_open: Arc<Mutex<bool>>,
    stats: Arc<SamplerStats>,
) {
    // First tick one period after start, like setInterval.
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pixels = PixelBuffer::default();
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                break;
            }

            _ = ticker.tick() => {}
        }

        let lost = {
            let open = dispatch_open.lock();
            if !*open {
                break;
            }
            stats.ticks.fetch_add(1, Ordering::Relaxed);

            let Some(permit) = slot.try_acquire() else {
                stats.skipped_busy.fetch_add(1, Ordering::Relaxed);
                log::trace!("Decode still running, skipping tick");
                continue;
            };

            let sample = {
                let mut handle = stream.lock();
                sample_frame(&mut handle, &mut pixels, sequence + 1)
            };

            match sample {
                Sample::NotReady => {
                    stats.skipped_not_ready.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                Sample::Frame(frame) => {
                    sequence += 1;
                    stats.frames_sampled.fetch_add(1, Ordering::Relaxed);
                    sink.on_frame(frame, permit);
                    continue;
                }
                Sample::Lost(error) => error,
            }
        };

        // Gate lock is released here; the sink is free to tear us down.
        log::warn!("Stream lost while sampling: {}", lost);
        cancel_token.cancel();
        sink.on_stream_lost(lost);
        break;
    }
}

fn sample_frame(
    handle: &mut crate::stream::StreamHandle,
    pixels: &mut PixelBuffer,
    sequence: u64,
) -> Sample {
    if let Some(reason) = handle.interruption() {
        return Sample::Lost(ScanError::StreamInterrupted { reason });
    }
    if handle.ready_state() < ReadyState::HaveEnoughData {
        return Sample::NotReady;
    }
    let (width, height) = handle.video_size();
    if width == 0 || height == 0 {
        return Sample::NotReady;
    }
    match handle.draw_into(pixels) {
        Ok(()) => Sample::Frame(Frame::from_buffer(sequence, pixels)),
        Err(e) => Sample::Lost(ScanError::StreamInterrupted {
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{CameraScenario, SimulatedCamera};
    use crate::device::{CameraDevice, CaptureConstraints};
    use crate::stream::StreamHandle;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<u64>>,
        held: Mutex<Vec<DecodePermit>>,
        hold_permits: bool,
        lost: Mutex<Vec<ScanError>>,
    }

    impl FrameSink for RecordingSink {
        fn on_frame(&self, frame: Frame, permit: DecodePermit) {
            self.frames.lock().push(frame.sequence);
            if self.hold_permits {
                self.held.lock().push(permit);
            }
        }

        fn on_stream_lost(&self, error: ScanError) {
            self.lost.lock().push(error);
        }
    }

    async fn open_stream(scenario: CameraScenario) -> (Arc<SimulatedCamera>, SharedStream) {
        let camera = Arc::new(SimulatedCamera::from_scenario(scenario));
        let stream = camera
            .get_user_media(&CaptureConstraints::default())
            .await
            .unwrap();
        (camera, StreamHandle::new(stream).into_shared())
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_at_fixed_cadence() {
        let (_camera, stream) = open_stream(CameraScenario::default()).await;
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            DecodeSlot::new(),
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.frames.lock().is_empty(), "no tick before one interval");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*sink.frames.lock(), vec![1, 2, 3]);

        sampler.stop();
        assert!(sampler.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_decode_skips_ticks() {
        let (_camera, stream) = open_stream(CameraScenario::default()).await;
        let sink = Arc::new(RecordingSink {
            hold_permits: true,
            ..Default::default()
        });

        let mut sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            DecodeSlot::new(),
            sink.clone(),
        );
        let stats = sampler.stats();

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(*sink.frames.lock(), vec![1], "one decode outstanding at most");
        assert_eq!(stats.snapshot().skipped_busy, 4);

        sink.held.lock().clear();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*sink.frames.lock(), vec![1, 2]);

        sampler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_held_across_runs_blocks_new_run() {
        let (_camera, stream) = open_stream(CameraScenario::default()).await;
        let sink = Arc::new(RecordingSink::default());
        let slot = DecodeSlot::new();

        // A decode from an earlier run is still outstanding.
        let leftover = slot.try_acquire().unwrap();
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());

        let mut sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            slot.clone(),
            sink.clone(),
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(sink.frames.lock().is_empty());
        assert_eq!(sampler.stats().snapshot().skipped_busy, 2);

        drop(leftover);
        assert!(!slot.is_busy());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*sink.frames.lock(), vec![1]);

        sampler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_ticks_are_counted() {
        let (_camera, stream) = open_stream(CameraScenario {
            warmup_ticks: 2,
            ..Default::default()
        })
        .await;
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            DecodeSlot::new(),
            sink.clone(),
        );
        tokio::time::sleep(Duration::from_millis(350)).await;
        sampler.stop();

        let counts = sampler.stats().snapshot();
        assert_eq!(counts.ticks, 3);
        assert_eq!(counts.skipped_not_ready, 2);
        assert_eq!(counts.frames_sampled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_after_stop() {
        let (_camera, stream) = open_stream(CameraScenario::default()).await;
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            DecodeSlot::new(),
            sink.clone(),
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        sampler.stop();
        sampler.stop();

        let seen = sink.frames.lock().len();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.frames.lock().len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_ending_reports_stream_lost() {
        let (camera, stream) = open_stream(CameraScenario {
            end_after_frames: Some(2),
            ..Default::default()
        })
        .await;
        let sink = Arc::new(RecordingSink::default());

        let sampler = FrameSampler::start(
            stream,
            Duration::from_millis(100),
            DecodeSlot::new(),
            sink.clone(),
        );
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(*sink.frames.lock(), vec![1, 2]);
        let lost = sink.lost.lock();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].kind(), "stream_interrupted");
        assert_eq!(camera.open_streams(), 0);
        assert_eq!(sampler.stats().snapshot().ticks, 3);
    }
}
