// Camera acquisition under user permission
//
// Tries the preferred constraints first (rear camera for scanning) and falls
// back once to any camera with the same resolution hints. Failures leave this
// module already classified.

use crate::device::{CameraDevice, CaptureConstraints};
use crate::error::ScanError;
use crate::stream::StreamHandle;
use std::sync::Arc;

/// A stream granted by `PermissionGate::acquire`
pub struct GrantedStream {
    pub handle: StreamHandle,
    /// True when the preferred constraints failed and the fallback succeeded
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct PermissionGate {
    device: Arc<dyn CameraDevice>,
    allow_fallback: bool,
}

impl PermissionGate {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            allow_fallback: true,
        }
    }

    pub fn with_fallback(mut self, allow_fallback: bool) -> Self {
        self.allow_fallback = allow_fallback;
        self
    }

    pub async fn acquire(&self, constraints: &CaptureConstraints) -> Result<GrantedStream, ScanError> {
        if !self.device.is_supported() {
            log::error!("Camera capture API unavailable");
            return Err(ScanError::UnsupportedEnvironment);
        }

        log::info!("Requesting camera access ({:?})", constraints.facing);

        let first_error = match self.device.get_user_media(constraints).await {
            Ok(stream) => {
                return Ok(GrantedStream {
                    handle: StreamHandle::new(stream),
                    used_fallback: false,
                })
            }
            Err(e) => e,
        };

        if !self.allow_fallback || constraints.facing.is_none() {
            let error = ScanError::classify(&first_error);
            log::error!("Camera access failed: {} ({})", error, first_error);
            return Err(error);
        }

        log::info!(
            "Preferred camera failed ({}), trying any camera",
            first_error
        );

        match self.device.get_user_media(&constraints.without_facing()).await {
            Ok(stream) => {
                log::info!("Fallback camera granted");
                Ok(GrantedStream {
                    handle: StreamHandle::new(stream),
                    used_fallback: true,
                })
            }
            Err(e) => {
                let error = ScanError::classify(&e);
                log::error!("Camera access failed: {} ({})", error, e);
                Err(error)
            }
        }
    }
}
