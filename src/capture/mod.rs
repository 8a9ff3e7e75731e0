#[cfg(feature = "camera-nokhwa")]
pub mod device;
pub mod stream;
pub mod synthetic;

use std::sync::Arc;

use crate::{
    error::CaptureError,
    settings::{CameraBackend, CameraSettings},
};

#[cfg(feature = "camera-nokhwa")]
pub use device::DeviceCamera;
pub use stream::{stream_channel, LiveStream, RawFrame, StreamFeed, StreamState};
pub use synthetic::{Permission, SyntheticCamera, SyntheticFault};

/// Something that can hand out a live video stream.
///
/// `acquire` asks for camera access once per call and fails with
/// [`CaptureError::DeviceUnavailable`] when access is refused or no device is
/// present. Releasing is done through the returned [`LiveStream`].
pub trait CaptureSource: Send + Sync {
    fn label(&self) -> String;

    fn acquire(&self) -> Result<LiveStream, CaptureError>;
}

pub fn build_source(settings: &CameraSettings) -> Result<Arc<dyn CaptureSource>, CaptureError> {
    match settings.backend {
        CameraBackend::Synthetic => Ok(Arc::new(SyntheticCamera::from_settings(settings))),
        CameraBackend::Device => {
            #[cfg(feature = "camera-nokhwa")]
            {
                Ok(Arc::new(DeviceCamera::new(settings.device_index)))
            }

            #[cfg(not(feature = "camera-nokhwa"))]
            {
                Err(CaptureError::Unsupported(
                    "device cameras need the camera-nokhwa feature".into(),
                ))
            }
        }
    }
}
