use crate::error::ErrorKind;
use crate::image_source::device_camera::interface::DeviceCamera;
use crate::image_source::raw_image::RawImage;
use std::sync::Arc;

/// Holds an opened camera and closes it when dropped, whichever way the
/// holder exits.
pub struct CameraLease {
    camera: Arc<dyn DeviceCamera + Send + Sync>,
}

impl CameraLease {
    pub fn acquire(camera: Arc<dyn DeviceCamera + Send + Sync>) -> Result<Self, ErrorKind> {
        camera.open()?;
        Ok(Self { camera })
    }

    pub fn grab_frame(&self) -> Result<RawImage, ErrorKind> {
        self.camera.grab_frame()
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.camera.close();
    }
}
