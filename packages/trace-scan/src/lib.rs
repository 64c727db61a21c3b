// Camera capture session core for batch code scanning
//
// Acquires the camera under user permission, samples frames from the live
// stream at a fixed cadence, hands them to a pluggable decoder and tears the
// hardware down deterministically on every exit path.
//
// Architecture:
// - `permission`: camera acquisition with rear -> any-camera fallback
// - `stream`: single owner of the live media stream
// - `sampler`: timed frame polling with skip-on-busy back-pressure
// - `decoder`: pluggable frame -> payload interface
// - `session`: the state machine the host UI talks to
// - `arbiter`: process-wide exclusivity of the camera

pub mod arbiter;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod frame;
pub mod payload;
pub mod permission;
pub mod sampler;
pub mod session;
pub mod stream;
pub mod types;

pub use arbiter::CameraArbiter;
pub use config::ScanConfig;
pub use decoder::{Decoder, EmbeddedTextDecoder};
pub use device::simulated::{CameraScenario, DeviceOutcome, SimulatedCamera};
pub use device::{CameraDevice, CaptureConstraints, FacingMode, MediaStream, ReadyState};
pub use error::{ConfigError, PlatformError, ScanError};
pub use frame::{Frame, PixelBuffer};
pub use payload::{BatchReference, Payload, PayloadError};
pub use permission::{GrantedStream, PermissionGate};
pub use sampler::{DecodePermit, DecodeSlot, FrameSampler, FrameSink, SamplerCounts, SamplerStats};
pub use session::ScanSession;
pub use stream::{SharedStream, StreamHandle};
pub use types::{ScanEvent, ScanState, SessionSnapshot, SessionStats, Termination};
