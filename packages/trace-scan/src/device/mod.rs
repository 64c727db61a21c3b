// Device API boundary
//
// The capture core never talks to a camera directly. Hosts implement
// `CameraDevice` (acquisition with constraint negotiation) and `MediaStream`
// (track control and frame extraction) for their platform:
// - a browser build wraps `getUserMedia` and a `<video>` element
// - native builds wrap their capture backend
// - `simulated::SimulatedCamera` replays a scripted scenario for tests and demos

pub mod simulated;

use crate::error::PlatformError;
use crate::frame::PixelBuffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, the usual choice for scanning
    Environment,
    /// Front camera
    User,
}

/// Device constraints for a capture request. Hints, not guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    #[serde(default)]
    pub facing: Option<FacingMode>,
    #[serde(default)]
    pub ideal_width: Option<u32>,
    #[serde(default)]
    pub ideal_height: Option<u32>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: Some(FacingMode::Environment),
            ideal_width: Some(1280),
            ideal_height: Some(720),
        }
    }
}

impl CaptureConstraints {
    /// Same resolution hints with no facing requirement
    pub fn without_facing(&self) -> Self {
        Self {
            facing: None,
            ..self.clone()
        }
    }
}

/// Media readiness, mirroring `HTMLMediaElement.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// State of a single hardware track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Live,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub label: String,
    pub state: TrackState,
}

/// A live media stream granted by the device
///
/// Only `StreamHandle` holds one of these; nothing else in the crate keeps a
/// reference to the underlying stream.
pub trait MediaStream: Send {
    fn id(&self) -> String;

    fn tracks(&self) -> Vec<TrackInfo>;

    /// Stop every track. Stopping an ended track is a no-op.
    fn stop_all_tracks(&mut self);

    fn ready_state(&self) -> ReadyState;

    /// Current intrinsic video size, (0, 0) before metadata is known
    fn video_size(&self) -> (u32, u32);

    /// Draw the current video frame into `target`, already sized to `video_size()`.
    fn draw_into(&mut self, target: &mut PixelBuffer) -> Result<(), PlatformError>;
}

/// Camera acquisition entry point of the host platform
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Whether the capture API exists at all (false in insecure contexts)
    fn is_supported(&self) -> bool {
        true
    }

    /// Ask for a camera matching `constraints`.
    ///
    /// May suspend indefinitely while the user looks at the permission prompt.
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;
}
