#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use trace_scan::device::TrackInfo;
use trace_scan::device::TrackState;
use trace_scan::{
    CameraDevice, CaptureConstraints, Decoder, DeviceOutcome, FacingMode, Frame, MediaStream,
    Payload, PixelBuffer, PlatformError, ReadyState, ScanConfig, ScanEvent, ScanSession, ScanState,
};

// =============================================================================
// MOCK CAMERA
// =============================================================================

/// Camera whose permission prompt can be held open and answered by the test
pub struct MockCamera {
    supported: AtomicBool,
    rear: Mutex<DeviceOutcome>,
    front: Mutex<DeviceOutcome>,
    hold_prompt: AtomicBool,
    prompt: Semaphore,
    requests: Mutex<Vec<Option<FacingMode>>>,
    live: Arc<LiveCounter>,
    tracks: Mutex<Vec<Arc<AtomicBool>>>,
}

#[derive(Default)]
pub struct LiveCounter {
    open: AtomicUsize,
    max_open: AtomicUsize,
    granted: AtomicUsize,
    reads_after_stop: AtomicUsize,
}

impl LiveCounter {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
        self.granted.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            supported: AtomicBool::new(true),
            rear: Mutex::new(DeviceOutcome::Grant),
            front: Mutex::new(DeviceOutcome::Grant),
            hold_prompt: AtomicBool::new(false),
            prompt: Semaphore::new(0),
            requests: Mutex::new(Vec::new()),
            live: Arc::new(LiveCounter::default()),
            tracks: Mutex::new(Vec::new()),
        })
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    pub fn deny_rear(&self, name: &str) {
        *self.rear.lock() = deny(name);
    }

    pub fn deny_front(&self, name: &str) {
        *self.front.lock() = deny(name);
    }

    pub fn grant_all(&self) {
        *self.rear.lock() = DeviceOutcome::Grant;
        *self.front.lock() = DeviceOutcome::Grant;
    }

    /// Keep every permission prompt pending until `answer_prompt` is called
    pub fn hold_prompts(&self) {
        self.hold_prompt.store(true, Ordering::SeqCst);
    }

    /// Let one pending (or the next) permission prompt resolve
    pub fn answer_prompt(&self) {
        self.prompt.add_permits(1);
    }

    pub fn requests(&self) -> Vec<Option<FacingMode>> {
        self.requests.lock().clone()
    }

    /// Streams granted and not yet stopped
    pub fn open_streams(&self) -> usize {
        self.live.open.load(Ordering::SeqCst)
    }

    /// Highest number of streams ever open at the same time
    pub fn max_open_streams(&self) -> usize {
        self.live.max_open.load(Ordering::SeqCst)
    }

    pub fn granted_streams(&self) -> usize {
        self.live.granted.load(Ordering::SeqCst)
    }

    /// Frame reads attempted on a stream after its tracks were stopped
    pub fn reads_after_stop(&self) -> usize {
        self.live.reads_after_stop.load(Ordering::SeqCst)
    }

    /// End the tracks of the most recent stream, as when a camera is unplugged
    pub fn unplug_latest(&self) {
        if let Some(ended) = self.tracks.lock().last() {
            ended.store(true, Ordering::SeqCst);
        }
    }
}

fn deny(name: &str) -> DeviceOutcome {
    DeviceOutcome::Deny {
        name: name.to_string(),
        message: format!("{} (mock)", name),
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        self.requests.lock().push(constraints.facing);

        if self.hold_prompt.load(Ordering::SeqCst) {
            if let Ok(permit) = self.prompt.acquire().await {
                permit.forget();
            }
        }

        let outcome = match constraints.facing {
            Some(FacingMode::Environment) => self.rear.lock().clone(),
            Some(FacingMode::User) => self.front.lock().clone(),
            None => {
                let rear = self.rear.lock().clone();
                if rear == DeviceOutcome::Grant {
                    rear
                } else {
                    self.front.lock().clone()
                }
            }
        };

        match outcome {
            DeviceOutcome::Deny { name, message } => Err(PlatformError::new(name, message)),
            DeviceOutcome::Grant => {
                let ended = Arc::new(AtomicBool::new(false));
                self.tracks.lock().push(Arc::clone(&ended));
                self.live.opened();
                let id = self.live.granted.load(Ordering::SeqCst);
                Ok(Box::new(MockStream {
                    id: format!("mock-stream-{}", id),
                    stopped: false,
                    ended,
                    live: Arc::clone(&self.live),
                }))
            }
        }
    }
}

struct MockStream {
    id: String,
    stopped: bool,
    ended: Arc<AtomicBool>,
    live: Arc<LiveCounter>,
}

impl MediaStream for MockStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        let state = if self.stopped || self.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        };
        vec![TrackInfo {
            id: format!("{}-video", self.id),
            label: "Mock camera".to_string(),
            state,
        }]
    }

    fn stop_all_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.closed();
        }
    }

    fn ready_state(&self) -> ReadyState {
        if self.stopped || self.ended.load(Ordering::SeqCst) {
            ReadyState::HaveNothing
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn video_size(&self) -> (u32, u32) {
        (32, 24)
    }

    fn draw_into(&mut self, target: &mut PixelBuffer) -> Result<(), PlatformError> {
        if self.stopped {
            self.live.reads_after_stop.fetch_add(1, Ordering::SeqCst);
            return Err(PlatformError::new("InvalidStateError", "stream stopped"));
        }
        target.as_mut_slice().fill(0x40);
        Ok(())
    }
}

// =============================================================================
// DECODER
// =============================================================================

/// Decoder that finds a payload in its n-th call and records every frame it saw
pub struct CountingDecoder {
    succeed_on: Option<u32>,
    payload: String,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<u64>>,
}

impl CountingDecoder {
    pub fn succeeding_on(call: u32, payload: &str) -> Arc<Self> {
        Arc::new(Self {
            succeed_on: Some(call),
            payload: payload.to_string(),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn never() -> Arc<Self> {
        Arc::new(Self {
            succeed_on: None,
            payload: String::new(),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Never succeeds and takes `delay` per frame
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            succeed_on: None,
            payload: String::new(),
            delay,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Succeeds on `call` like `succeeding_on`, taking `delay` per frame
    pub fn slow_succeeding(call: u32, payload: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            succeed_on: Some(call),
            payload: payload.to_string(),
            delay,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }

    /// Most decodes ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for CountingDecoder {
    async fn decode(&self, frame: &Frame) -> Option<Payload> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.seen.lock().push(frame.sequence);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.succeed_on == Some(call)).then(|| Payload::new(self.payload.clone()))
    }
}

// =============================================================================
// SESSION HELPERS
// =============================================================================

pub fn config_with_interval(interval_ms: u64) -> ScanConfig {
    ScanConfig {
        sample_interval_ms: interval_ms,
        ..Default::default()
    }
}

pub fn session(camera: &Arc<MockCamera>, decoder: Arc<CountingDecoder>) -> ScanSession {
    ScanSession::new(config_with_interval(100), camera.clone(), decoder)
}

/// Record every event the session emits
pub fn record_events(session: &ScanSession) -> Arc<Mutex<Vec<ScanEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    session.set_event_callback(move |event| sink.lock().push(event));
    events
}

pub fn states(events: &Mutex<Vec<ScanEvent>>) -> Vec<ScanState> {
    events
        .lock()
        .iter()
        .filter_map(|event| match event {
            ScanEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Let every ready task run. The paused clock only auto-advances once the
/// runtime is idle, so this moves time forward by a single millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance time in small steps until the session reaches `state`
pub async fn wait_for_state(session: &ScanSession, state: ScanState) {
    for _ in 0..1_000 {
        if session.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "session never reached {:?}, stuck in {:?}",
        state,
        session.state()
    );
}
