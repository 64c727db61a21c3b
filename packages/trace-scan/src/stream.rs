// Single owner of a live camera stream
//
// Every path that gives the camera back goes through `StreamHandle::release`,
// which is idempotent. The sampler reaches the stream only through a
// `SharedStream`, so release stays centrally enforced.

use crate::device::{MediaStream, ReadyState, TrackInfo, TrackState};
use crate::error::PlatformError;
use crate::frame::PixelBuffer;
use parking_lot::Mutex;
use std::sync::Arc;

/// Handle shared between the session and its sampler
pub type SharedStream = Arc<Mutex<StreamHandle>>;

pub struct StreamHandle {
    id: String,
    stream: Box<dyn MediaStream>,
    released: bool,
}

impl StreamHandle {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        let id = stream.id();
        log::debug!("Stream {} acquired", id);
        Self {
            id,
            stream,
            released: false,
        }
    }

    pub fn into_shared(self) -> SharedStream {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop every underlying track.
    ///
    /// Returns `true` only for the call that actually released the stream.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.stream.stop_all_tracks();
        self.released = true;
        log::info!("Stream {} released", self.id);
        true
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.stream.tracks()
    }

    /// True once every track reports `Ended`
    pub fn all_tracks_ended(&self) -> bool {
        self.stream
            .tracks()
            .iter()
            .all(|track| track.state == TrackState::Ended)
    }

    /// Describes a track that ended while the handle was still held.
    pub fn interruption(&self) -> Option<String> {
        if self.released {
            return None;
        }
        self.stream
            .tracks()
            .into_iter()
            .find(|track| track.state == TrackState::Ended)
            .map(|track| format!("track '{}' ended", track.label))
    }

    pub fn ready_state(&self) -> ReadyState {
        if self.released {
            return ReadyState::HaveNothing;
        }
        self.stream.ready_state()
    }

    pub fn video_size(&self) -> (u32, u32) {
        self.stream.video_size()
    }

    /// Copy the current frame into `target`, resizing it to the video size.
    pub fn draw_into(&mut self, target: &mut PixelBuffer) -> Result<(), PlatformError> {
        if self.released {
            return Err(PlatformError::new(
                "InvalidStateError",
                "stream already released",
            ));
        }
        let (width, height) = self.stream.video_size();
        target.resize(width, height);
        self.stream.draw_into(target)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("Stream {} dropped without release, stopping tracks", self.id);
            self.release();
        }
    }
}
