// Pluggable frame decoding
//
// The session only depends on `Decoder`. Symbol decoding proper (QR, 1D
// barcodes) lives in whatever implementation the host plugs in; CPU-heavy
// decoders should move their work to `tokio::task::spawn_blocking` so the
// sampling timer is never held up.

use crate::frame::Frame;
use crate::payload::Payload;
use async_trait::async_trait;

#[async_trait]
pub trait Decoder: Send + Sync {
    /// Try to read a payload from `frame`. `None` means "no result yet", not an error.
    async fn decode(&self, frame: &Frame) -> Option<Payload>;
}

const MAGIC: &[u8; 4] = b"TRC1";
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Reads text embedded at the start of the pixel data.
///
/// Layout: `TRC1` magic, big-endian `u16` length, UTF-8 bytes. The simulated
/// camera writes payloads this way.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedTextDecoder;

impl EmbeddedTextDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Write `text` into `pixels`. Returns false when it does not fit.
    pub fn embed(text: &str, pixels: &mut [u8]) -> bool {
        let bytes = text.as_bytes();
        let Ok(len) = u16::try_from(bytes.len()) else {
            return false;
        };
        if pixels.len() < HEADER_LEN + bytes.len() {
            return false;
        }
        pixels[..MAGIC.len()].copy_from_slice(MAGIC);
        pixels[MAGIC.len()..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
        pixels[HEADER_LEN..HEADER_LEN + bytes.len()].copy_from_slice(bytes);
        true
    }

    pub fn extract(pixels: &[u8]) -> Option<String> {
        if pixels.len() < HEADER_LEN || &pixels[..MAGIC.len()] != MAGIC {
            return None;
        }
        let len = u16::from_be_bytes([pixels[4], pixels[5]]) as usize;
        let body = pixels.get(HEADER_LEN..HEADER_LEN + len)?;
        String::from_utf8(body.to_vec()).ok()
    }
}

#[async_trait]
impl Decoder for EmbeddedTextDecoder {
    async fn decode(&self, frame: &Frame) -> Option<Payload> {
        let text = Self::extract(&frame.pixels)?;
        log::debug!("Decoded payload from frame {}", frame.sequence);
        Some(Payload::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelBuffer;

    #[test]
    fn test_embed_and_extract() {
        let mut pixels = vec![0u8; 64];
        assert!(EmbeddedTextDecoder::embed("BATCH-42", &mut pixels));
        assert_eq!(
            EmbeddedTextDecoder::extract(&pixels).as_deref(),
            Some("BATCH-42")
        );
    }

    #[test]
    fn test_embed_rejects_oversized_text() {
        let mut pixels = vec![0u8; 8];
        assert!(!EmbeddedTextDecoder::embed("too long for this", &mut pixels));
        assert!(EmbeddedTextDecoder::extract(&pixels).is_none());
    }

    #[test]
    fn test_truncated_length_is_no_result() {
        let mut pixels = vec![0u8; 16];
        assert!(EmbeddedTextDecoder::embed("abcd", &mut pixels));
        pixels[5] = 200;
        assert!(EmbeddedTextDecoder::extract(&pixels).is_none());
    }

    #[tokio::test]
    async fn test_decode_blank_frame_is_none() {
        let buffer = PixelBuffer::new(8, 8);
        let frame = Frame::from_buffer(1, &buffer);
        assert!(EmbeddedTextDecoder.decode(&frame).await.is_none());
    }
}
