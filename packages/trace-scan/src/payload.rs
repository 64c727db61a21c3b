// Decoded payloads and batch references
//
// The session hands `Payload` upward untouched. Transfer forms want the batch
// id inside it, which may be printed either bare or as a tracking URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_BATCH_ID_LEN: usize = 64;

/// Text decoded from a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub text: String,
}

impl Payload {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Scanned code is empty")]
    Empty,

    #[error("Scanned code does not contain a valid batch id: {0}")]
    InvalidBatchId(String),
}

/// Batch id extracted from a scanned code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchReference(String);

impl BatchReference {
    pub fn from_payload(payload: &Payload) -> Result<Self, PayloadError> {
        let text = payload.text.trim();
        if text.is_empty() {
            return Err(PayloadError::Empty);
        }

        let candidate = match batch_segment(text) {
            Some(segment) => segment,
            None => text,
        };

        if is_valid_id(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(PayloadError::InvalidBatchId(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path segment following `batch` in a URL or path, query and fragment dropped.
fn batch_segment(text: &str) -> Option<&str> {
    let path = text.split(['?', '#']).next().unwrap_or(text);
    let mut segments = path.split('/');
    segments.find(|segment| *segment == "batch")?;
    segments.find(|segment| !segment.is_empty())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_BATCH_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
