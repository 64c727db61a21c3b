// Capture session state machine
//
// The only component the host UI talks to. It manages:
// - Permission acquisition (one pending request per attempt)
// - Stream ownership and the frame sampler
// - Decode outcomes, stream loss and the optional idle timeout
// - Deterministic teardown: sampler first, then the stream, on every exit
//
// Each `start()` opens a new attempt epoch. Anything resolving later for an
// older epoch (a late permission grant, a slow decode, a stale timer) is
// discarded, and a late granted stream is released on the spot.

use crate::arbiter::CameraArbiter;
use crate::config::ScanConfig;
use crate::decoder::Decoder;
use crate::device::CameraDevice;
use crate::error::ScanError;
use crate::frame::Frame;
use crate::payload::Payload;
use crate::permission::{GrantedStream, PermissionGate};
use crate::sampler::{DecodePermit, DecodeSlot, FrameSampler, FrameSink};
use crate::stream::SharedStream;
use crate::types::{ScanEvent, ScanState, SessionSnapshot, SessionStats, Termination};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

type EventCallback = Arc<dyn Fn(ScanEvent) + Send + Sync>;

/// Handle to a capture session. Clones share the same session.
#[derive(Clone)]
pub struct ScanSession {
    shared: Arc<SessionShared>,
}

pub(crate) struct SessionShared {
    id: String,
    config: ScanConfig,
    gate: PermissionGate,
    decoder: Arc<dyn Decoder>,
    decode_slot: DecodeSlot,
    arbiter: RwLock<Option<Arc<CameraArbiter>>>,
    inner: Mutex<SessionInner>,
    event_callback: RwLock<Option<EventCallback>>,
}

#[derive(Default)]
struct SessionInner {
    state: ScanState,
    epoch: u64,
    stream: Option<SharedStream>,
    sampler: Option<FrameSampler>,
    idle_timer: Option<CancellationToken>,
    result: Option<Payload>,
    last_error: Option<ScanError>,
    termination: Option<Termination>,
    disposed: bool,
    stats: SessionStats,
}

impl SessionInner {
    fn transition(&mut self, session_id: &str, state: ScanState, events: &mut Vec<ScanEvent>) {
        log::info!("Session {}: {:?} -> {:?}", session_id, self.state, state);
        self.state = state;
        events.push(ScanEvent::StateChanged {
            session_id: session_id.to_string(),
            state,
        });
    }

    fn is_current(&self, epoch: u64, state: ScanState) -> bool {
        self.epoch == epoch && self.state == state
    }

    /// Stop the sampler, then release the stream. Safe to call with nothing held.
    fn teardown(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.cancel();
        }
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
            self.stats.absorb_sampler(&sampler.stats());
        }
        if let Some(stream) = self.stream.take() {
            stream.lock().release();
        }
    }
}

impl SessionShared {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    fn dispatch(&self, events: Vec<ScanEvent>) {
        if events.is_empty() {
            return;
        }
        let callback = self.event_callback.read().clone();
        if let Some(callback) = callback {
            for event in events {
                callback(event);
            }
        }
    }

    fn arbiter(&self) -> Option<Arc<CameraArbiter>> {
        self.arbiter.read().clone()
    }

    fn release_claim(&self) {
        if let Some(arbiter) = self.arbiter() {
            arbiter.release(&self.id);
        }
    }

    /// Leave `RequestingPermission` or `Streaming` for `Stopped`. No-op otherwise.
    pub(crate) fn halt(&self, termination: Termination) -> bool {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ScanState::Idle | ScanState::Stopped | ScanState::Failed => return false,
                ScanState::RequestingPermission => {
                    log::info!(
                        "Session {} stopped while the permission prompt is pending",
                        self.id
                    );
                }
                ScanState::Streaming => inner.teardown(),
            }
            inner.termination = Some(termination);
            inner.transition(&self.id, ScanState::Stopped, &mut events);
        }
        self.release_claim();
        self.dispatch(events);
        true
    }

    fn on_permission(self: &Arc<Self>, epoch: u64, result: Result<GrantedStream, ScanError>) {
        let mut events = Vec::new();
        let failed = {
            let mut inner = self.inner.lock();

            if !inner.is_current(epoch, ScanState::RequestingPermission) {
                if let Ok(mut granted) = result {
                    log::warn!(
                        "Camera granted after session {} moved on, releasing stream {}",
                        self.id,
                        granted.handle.id()
                    );
                    granted.handle.release();
                    inner.stats.stale_grants_released += 1;
                }
                return;
            }

            match result {
                Ok(granted) => {
                    // A previous stream or sampler must never survive into a new one.
                    inner.teardown();

                    if granted.used_fallback {
                        inner.stats.fallback_grants += 1;
                    }

                    let stream = granted.handle.into_shared();
                    let sink = Arc::new(SessionSink {
                        session: Arc::downgrade(self),
                        decoder: Arc::clone(&self.decoder),
                        epoch,
                    });
                    inner.sampler = Some(FrameSampler::start(
                        Arc::clone(&stream),
                        self.config.sample_interval(),
                        self.decode_slot.clone(),
                        sink,
                    ));
                    inner.stream = Some(stream);

                    if let Some(timeout) = self.config.idle_timeout() {
                        inner.idle_timer = Some(spawn_idle_timer(Arc::downgrade(self), epoch, timeout));
                    }

                    inner.transition(&self.id, ScanState::Streaming, &mut events);
                    false
                }
                Err(error) => {
                    log::error!("Session {} failed to acquire camera: {}", self.id, error);
                    inner.last_error = Some(error.clone());
                    inner.termination = Some(Termination::Failed);
                    inner.transition(&self.id, ScanState::Failed, &mut events);
                    events.push(ScanEvent::Error {
                        session_id: self.id.clone(),
                        error,
                    });
                    true
                }
            }
        };

        if failed {
            self.release_claim();
        }
        self.dispatch(events);
    }

    fn on_decode(&self, epoch: u64, frame_sequence: u64, payload: Option<Payload>) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(epoch, ScanState::Streaming) {
                if payload.is_some() {
                    log::debug!(
                        "Session {} discarding decode of frame {} after stop",
                        self.id,
                        frame_sequence
                    );
                }
                return;
            }
            inner.stats.decode_attempts += 1;

            let Some(payload) = payload else {
                log::trace!("Frame {} had no payload", frame_sequence);
                return;
            };

            log::info!("Session {} decoded frame {}", self.id, frame_sequence);
            inner.teardown();
            inner.result = Some(payload.clone());
            inner.termination = Some(Termination::Decoded);
            inner.transition(&self.id, ScanState::Stopped, &mut events);
            events.push(ScanEvent::Result {
                session_id: self.id.clone(),
                payload,
            });
        }
        self.release_claim();
        self.dispatch(events);
    }

    fn on_stream_lost(&self, epoch: u64, error: ScanError) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(epoch, ScanState::Streaming) {
                return;
            }
            log::error!("Session {} lost its stream: {}", self.id, error);
            inner.teardown();
            inner.last_error = Some(error.clone());
            inner.termination = Some(Termination::Failed);
            inner.transition(&self.id, ScanState::Failed, &mut events);
            events.push(ScanEvent::Error {
                session_id: self.id.clone(),
                error,
            });
        }
        self.release_claim();
        self.dispatch(events);
    }

    fn on_idle_timeout(&self, epoch: u64) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(epoch, ScanState::Streaming) {
                return;
            }
            log::info!("Session {} timed out without a payload", self.id);
            inner.idle_timer = None;
            inner.teardown();
            inner.termination = Some(Termination::TimedOut);
            inner.transition(&self.id, ScanState::Stopped, &mut events);
        }
        self.release_claim();
        self.dispatch(events);
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.stream.is_some() || inner.sampler.is_some() {
            log::warn!("Session {} dropped while holding the camera", self.id);
            inner.teardown();
        }
        if let Some(arbiter) = self.arbiter.get_mut() {
            arbiter.release(&self.id);
        }
    }
}

/// Bridges sampler callbacks into the session without keeping it alive
struct SessionSink {
    session: Weak<SessionShared>,
    decoder: Arc<dyn Decoder>,
    epoch: u64,
}

impl FrameSink for SessionSink {
    fn on_frame(&self, frame: Frame, permit: DecodePermit) {
        let session = Weak::clone(&self.session);
        let decoder = Arc::clone(&self.decoder);
        let epoch = self.epoch;

        tokio::spawn(async move {
            let payload = decoder.decode(&frame).await;
            if let Some(session) = session.upgrade() {
                session.on_decode(epoch, frame.sequence, payload);
            }
            // The slot frees only after the outcome is applied, so no frame
            // is sampled after a successful decode.
            drop(permit);
        });
    }

    fn on_stream_lost(&self, error: ScanError) {
        if let Some(session) = self.session.upgrade() {
            session.on_stream_lost(self.epoch, error);
        }
    }
}

fn spawn_idle_timer(session: Weak<SessionShared>, epoch: u64, timeout: Duration) -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let cancelled = cancel_token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {}
            _ = sleep(timeout) => {
                if let Some(session) = session.upgrade() {
                    session.on_idle_timeout(epoch);
                }
            }
        }
    });

    cancel_token
}

impl ScanSession {
    pub fn new(config: ScanConfig, device: Arc<dyn CameraDevice>, decoder: Arc<dyn Decoder>) -> Self {
        let gate = PermissionGate::new(device).with_fallback(config.allow_fallback);
        let id = uuid::Uuid::new_v4().to_string();
        log::debug!("Session {} created", id);

        Self {
            shared: Arc::new(SessionShared {
                id,
                config,
                gate,
                decoder,
                decode_slot: DecodeSlot::new(),
                arbiter: RwLock::new(None),
                inner: Mutex::new(SessionInner::default()),
                event_callback: RwLock::new(None),
            }),
        }
    }

    /// Share the camera with other sessions through `arbiter`.
    ///
    /// Applies to every clone of this handle, from the next `start()` on.
    pub fn with_arbiter(self, arbiter: Arc<CameraArbiter>) -> Self {
        *self.shared.arbiter.write() = Some(arbiter);
        self
    }

    /// Set the callback receiving state changes, results and errors.
    ///
    /// Events are delivered after internal locks are released, so the callback
    /// may call back into the session (e.g. `stop()`).
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(ScanEvent) + Send + Sync + 'static,
    {
        *self.shared.event_callback.write() = Some(Arc::new(callback));
    }

    /// Begin a capture attempt. Must be called inside a tokio runtime.
    ///
    /// No-op while `RequestingPermission` or `Streaming`, and after `dispose()`.
    pub fn start(&self) {
        let shared = &self.shared;
        {
            let inner = shared.inner.lock();
            if inner.disposed {
                log::warn!("Session {} is disposed, ignoring start()", shared.id);
                return;
            }
            if inner.state.is_active() {
                log::debug!("Session {} already {:?}, ignoring start()", shared.id, inner.state);
                return;
            }
        }

        if let Some(arbiter) = shared.arbiter() {
            arbiter.claim(shared);
        }

        let mut events = Vec::new();
        let epoch = {
            let mut inner = shared.inner.lock();
            if inner.disposed || inner.state.is_active() {
                return;
            }
            inner.teardown();
            inner.epoch += 1;
            inner.result = None;
            inner.last_error = None;
            inner.termination = None;
            inner.stats.attempts += 1;
            inner.transition(&shared.id, ScanState::RequestingPermission, &mut events);
            inner.epoch
        };
        shared.dispatch(events);

        let gate = shared.gate.clone();
        let constraints = shared.config.constraints.clone();
        let session = Arc::downgrade(shared);

        tokio::spawn(async move {
            let result = gate.acquire(&constraints).await;
            match session.upgrade() {
                Some(session) => session.on_permission(epoch, result),
                None => {
                    if let Ok(mut granted) = result {
                        log::warn!("Camera granted after its session was dropped, releasing");
                        granted.handle.release();
                    }
                }
            }
        });
    }

    /// Stop scanning and give the camera back. No-op when nothing is running.
    pub fn stop(&self) {
        self.shared.halt(Termination::Cancelled);
    }

    /// Tear down for good: stop, drop the event callback, refuse further starts.
    ///
    /// Hosts call this when the scanning UI closes.
    pub fn dispose(&self) {
        self.shared.halt(Termination::Cancelled);
        self.shared.inner.lock().disposed = true;
        *self.shared.event_callback.write() = None;
        log::debug!("Session {} disposed", self.shared.id);
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ScanState {
        self.shared.inner.lock().state
    }

    pub fn result(&self) -> Option<Payload> {
        self.shared.inner.lock().result.clone()
    }

    pub fn last_error(&self) -> Option<ScanError> {
        self.shared.inner.lock().last_error.clone()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.shared.inner.lock().termination
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.inner.lock().disposed
    }

    /// Whether a stream is currently owned by this session
    pub fn holds_stream(&self) -> bool {
        self.shared.inner.lock().stream.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        let inner = self.shared.inner.lock();
        let mut stats = inner.stats.clone();
        if let Some(sampler) = &inner.sampler {
            stats.absorb_sampler(&sampler.stats());
        }
        stats
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let stats = self.stats();
        let inner = self.shared.inner.lock();
        SessionSnapshot {
            session_id: self.shared.id.clone(),
            state: inner.state,
            result: inner.result.clone(),
            last_error: inner.last_error.clone(),
            termination: inner.termination,
            holds_stream: inner.stream.is_some(),
            stats,
        }
    }
}
