// Error taxonomy for camera acquisition and streaming
//
// Platform failures arrive as `PlatformError` (a DOMException-style name plus
// message) and are classified into `ScanError` at the permission boundary.
// Nothing above that boundary ever sees a raw platform error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw failure reported by the device layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct PlatformError {
    pub name: String,
    pub message: String,
}

impl PlatformError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Classified scan failure, surfaced to the host through `ScanEvent::Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NoDeviceFound,

    #[error("Camera is busy")]
    DeviceBusy,

    #[error("Camera capture is not supported in this environment")]
    UnsupportedEnvironment,

    #[error("Camera stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    #[error("Unknown camera error: {message}")]
    Unknown { message: String },
}

impl ScanError {
    /// Classify a platform failure by its error name.
    pub fn classify(error: &PlatformError) -> Self {
        match error.name.as_str() {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                Self::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                Self::NoDeviceFound
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => Self::DeviceBusy,
            "NotSupportedError" | "TypeError" => Self::UnsupportedEnvironment,
            _ => Self::Unknown {
                message: error.message.clone(),
            },
        }
    }

    /// Stable machine-readable name of the kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoDeviceFound => "no_device_found",
            Self::DeviceBusy => "device_busy",
            Self::UnsupportedEnvironment => "unsupported_environment",
            Self::StreamInterrupted { .. } => "stream_interrupted",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// The single message shown to the user for this kind.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Unable to access camera. Please allow camera permissions in your browser settings."
                    .to_string()
            }
            Self::NoDeviceFound => {
                "Unable to access camera. No camera found on your device.".to_string()
            }
            Self::DeviceBusy => {
                "Unable to access camera. Camera is already in use by another application."
                    .to_string()
            }
            Self::UnsupportedEnvironment => {
                "Camera access not supported. Please use HTTPS or check browser compatibility."
                    .to_string()
            }
            Self::StreamInterrupted { .. } => {
                "The camera stopped unexpectedly. Please try scanning again.".to_string()
            }
            Self::Unknown { message } => format!("Unable to access camera. Error: {}", message),
        }
    }

    /// One representative of every kind, in declaration order.
    pub fn catalog() -> Vec<ScanError> {
        vec![
            Self::PermissionDenied,
            Self::NoDeviceFound,
            Self::DeviceBusy,
            Self::UnsupportedEnvironment,
            Self::StreamInterrupted {
                reason: "track ended".to_string(),
            },
            Self::Unknown {
                message: "<platform message>".to_string(),
            },
        ]
    }
}

impl From<PlatformError> for ScanError {
    fn from(error: PlatformError) -> Self {
        Self::classify(&error)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
