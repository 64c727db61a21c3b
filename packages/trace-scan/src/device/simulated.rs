// Scripted camera that simulates permission prompts and a live feed
//
// Useful for:
// - Exercising the capture session without camera hardware
// - Replaying awkward device behavior (denied rear camera, busy device,
//   tracks that end on their own)
// - The `tracescan simulate` command

use super::{CameraDevice, CaptureConstraints, FacingMode, MediaStream, ReadyState, TrackInfo, TrackState};
use crate::decoder::EmbeddedTextDecoder;
use crate::error::{ConfigError, PlatformError};
use crate::frame::PixelBuffer;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// How the simulated device answers a request for one camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcome {
    Grant,
    Deny { name: String, message: String },
}

impl DeviceOutcome {
    fn is_grant(&self) -> bool {
        matches!(self, DeviceOutcome::Grant)
    }
}

/// Scripted behavior of a simulated camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraScenario {
    /// False simulates a missing capture API
    pub supported: bool,
    pub rear: DeviceOutcome,
    pub front: DeviceOutcome,
    /// Time the user takes to answer the permission prompt
    pub grant_delay_ms: u64,
    pub width: u32,
    pub height: u32,
    /// Ready-state polls answered with `HaveMetadata` before frames flow
    pub warmup_ticks: u32,
    /// Payload embedded in each successive frame; the last entry repeats
    pub frames: Vec<Option<String>>,
    /// The track ends by itself after this many frames
    pub end_after_frames: Option<u32>,
}

impl Default for CameraScenario {
    fn default() -> Self {
        Self {
            supported: true,
            rear: DeviceOutcome::Grant,
            front: DeviceOutcome::Grant,
            grant_delay_ms: 0,
            width: 64,
            height: 48,
            warmup_ticks: 0,
            frames: Vec::new(),
            end_after_frames: None,
        }
    }
}

impl CameraScenario {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Blank frames until `frame_number` (1-based), which carries `payload`.
    pub fn payload_on_frame(frame_number: usize, payload: impl Into<String>) -> Self {
        let mut frames = vec![None; frame_number.saturating_sub(1)];
        frames.push(Some(payload.into()));
        frames.push(None);
        Self {
            frames,
            ..Default::default()
        }
    }
}

pub struct SimulatedCamera {
    scenario: CameraScenario,
    open_streams: Arc<AtomicUsize>,
    requests: Mutex<Vec<Option<FacingMode>>>,
}

impl SimulatedCamera {
    pub fn from_scenario(scenario: CameraScenario) -> Self {
        Self {
            scenario,
            open_streams: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn scenario(&self) -> &CameraScenario {
        &self.scenario
    }

    /// Streams granted and not yet stopped or ended
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Facing mode of every `get_user_media` call, in order
    pub fn requests(&self) -> Vec<Option<FacingMode>> {
        self.requests.lock().clone()
    }

    fn outcome_for(&self, facing: Option<FacingMode>) -> (&DeviceOutcome, &'static str) {
        match facing {
            Some(FacingMode::Environment) => (&self.scenario.rear, "Simulated rear camera"),
            Some(FacingMode::User) => (&self.scenario.front, "Simulated front camera"),
            None if self.scenario.rear.is_grant() => {
                (&self.scenario.rear, "Simulated rear camera")
            }
            None => (&self.scenario.front, "Simulated front camera"),
        }
    }
}

#[async_trait]
impl CameraDevice for SimulatedCamera {
    fn is_supported(&self) -> bool {
        self.scenario.supported
    }

    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        self.requests.lock().push(constraints.facing);

        if self.scenario.grant_delay_ms > 0 {
            sleep(Duration::from_millis(self.scenario.grant_delay_ms)).await;
        }

        let (outcome, label) = self.outcome_for(constraints.facing);
        match outcome {
            DeviceOutcome::Deny { name, message } => {
                log::debug!("Simulated camera denied: {} ({})", name, message);
                Err(PlatformError::new(name.clone(), message.clone()))
            }
            DeviceOutcome::Grant => {
                self.open_streams.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(SimulatedStream {
                    id: uuid::Uuid::new_v4().to_string(),
                    label,
                    state: TrackState::Live,
                    open_streams: Arc::clone(&self.open_streams),
                    width: self.scenario.width,
                    height: self.scenario.height,
                    warmup_remaining: AtomicU32::new(self.scenario.warmup_ticks),
                    frames: self.scenario.frames.clone(),
                    drawn: 0,
                    end_after_frames: self.scenario.end_after_frames,
                }))
            }
        }
    }
}

struct SimulatedStream {
    id: String,
    label: &'static str,
    state: TrackState,
    open_streams: Arc<AtomicUsize>,
    width: u32,
    height: u32,
    warmup_remaining: AtomicU32,
    frames: Vec<Option<String>>,
    drawn: u32,
    end_after_frames: Option<u32>,
}

impl SimulatedStream {
    fn end(&mut self) {
        if self.state == TrackState::Live {
            self.state = TrackState::Ended;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl MediaStream for SimulatedStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: format!("{}-video", self.id),
            label: self.label.to_string(),
            state: self.state,
        }]
    }

    fn stop_all_tracks(&mut self) {
        self.end();
    }

    fn ready_state(&self) -> ReadyState {
        if self.state == TrackState::Ended {
            return ReadyState::HaveNothing;
        }
        let warmup = self.warmup_remaining.load(Ordering::SeqCst);
        if warmup > 0 {
            self.warmup_remaining.store(warmup - 1, Ordering::SeqCst);
            return ReadyState::HaveMetadata;
        }
        ReadyState::HaveEnoughData
    }

    fn video_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_into(&mut self, target: &mut PixelBuffer) -> Result<(), PlatformError> {
        if self.state == TrackState::Ended {
            return Err(PlatformError::new("InvalidStateError", "track has ended"));
        }

        let pixels = target.as_mut_slice();
        pixels.fill(0x80);

        let payload = self
            .frames
            .get(self.drawn as usize)
            .or_else(|| self.frames.last())
            .cloned()
            .flatten();
        if let Some(text) = payload {
            if !EmbeddedTextDecoder::embed(&text, pixels) {
                log::warn!("Simulated payload '{}' does not fit the frame", text);
            }
        }

        self.drawn += 1;
        if self.end_after_frames == Some(self.drawn) {
            log::debug!("Simulated track {} ended by itself", self.id);
            self.end();
        }
        Ok(())
    }
}
