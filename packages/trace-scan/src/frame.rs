// Off-screen pixel buffer and sampled frames
//
// The sampler keeps one `PixelBuffer` alive for the whole session (the
// equivalent of a hidden canvas), resizes it to the current video size on
// every tick and snapshots it into an immutable `Frame` for the decoder.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Reusable RGBA drawing surface
#[derive(Debug, Default, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut buffer = Self::default();
        buffer.resize(width, height);
        buffer
    }

    /// Resize to the given dimensions, clearing the contents when the size changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * BYTES_PER_PIXEL, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single sampled video frame handed to the decoder
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based sample counter within one sampler run
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, row-major
    pub pixels: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn from_buffer(sequence: u64, buffer: &PixelBuffer) -> Self {
        Self {
            sequence,
            width: buffer.width(),
            height: buffer.height(),
            pixels: Bytes::copy_from_slice(buffer.as_slice()),
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}
