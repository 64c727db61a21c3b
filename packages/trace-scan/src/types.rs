// Common types for the capture session

use crate::error::ScanError;
use crate::payload::Payload;
use crate::sampler::SamplerStats;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Created, nothing requested yet
    Idle,

    /// Waiting for the user or OS to answer the camera prompt
    RequestingPermission,

    /// Stream held and frames being sampled
    Streaming,

    /// Ended normally (decoded, cancelled, preempted or timed out). Holds no stream.
    Stopped,

    /// Ended with a classified error. Holds no stream.
    Failed,
}

impl ScanState {
    /// States in which the session owns, or is about to own, the camera
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::RequestingPermission | ScanState::Streaming)
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Why the last attempt ended. Exactly one per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A payload was decoded
    Decoded,
    /// `stop()` or `dispose()` by the host
    Cancelled,
    /// Another session claimed the camera
    Preempted,
    /// Idle timeout elapsed without a payload
    TimedOut,
    /// Acquisition or the live stream failed
    Failed,
}

/// Events emitted to the host UI
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    StateChanged { session_id: String, state: ScanState },
    Result { session_id: String, payload: Payload },
    Error { session_id: String, error: ScanError },
}

/// Counters across every attempt of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub attempts: u64,
    pub fallback_grants: u64,
    pub stale_grants_released: u64,
    pub decode_attempts: u64,
    pub ticks: u64,
    pub frames_sampled: u64,
    pub skipped_busy: u64,
    pub skipped_not_ready: u64,
}

impl SessionStats {
    pub(crate) fn absorb_sampler(&mut self, sampler: &SamplerStats) {
        let snapshot = sampler.snapshot();
        self.ticks += snapshot.ticks;
        self.frames_sampled += snapshot.frames_sampled;
        self.skipped_busy += snapshot.skipped_busy;
        self.skipped_not_ready += snapshot.skipped_not_ready;
    }
}

/// Point-in-time view of a session, for diagnostics and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: ScanState,
    pub result: Option<Payload>,
    pub last_error: Option<ScanError>,
    pub termination: Option<Termination>,
    pub holds_stream: bool,
    pub stats: SessionStats,
}
