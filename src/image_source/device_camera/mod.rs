pub mod impl_fake;
pub mod interface;
pub mod lease;

use crate::error::ErrorKind;
use crate::image_source::raw_image::RawImage;
use crate::image_source::ImageSource;
use crate::library::cancel::CancelToken;
use crate::library::logger::interface::Logger;
use interface::DeviceCamera;
use lease::CameraLease;
use std::sync::Arc;

/// The camera variant: claims the device, grabs one frame, lets go.
///
/// A cancelled capture never opens the device, and one cancelled while the
/// grab is blocking closes it as soon as the grab returns and drops the frame.
pub struct CameraSource {
    camera: Arc<dyn DeviceCamera + Send + Sync>,
    logger: Arc<dyn Logger + Send + Sync>,
    cancel: CancelToken,
}

impl CameraSource {
    pub fn new(
        camera: Arc<dyn DeviceCamera + Send + Sync>,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Self {
        Self {
            camera,
            logger: logger.with_namespace("camera"),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl ImageSource for CameraSource {
    fn acquire(&self) -> Result<RawImage, ErrorKind> {
        if self.cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled);
        }

        let lease = CameraLease::acquire(Arc::clone(&self.camera))?;
        let grabbed = lease.grab_frame();
        drop(lease);

        if self.cancel.is_cancelled() {
            let _ = self.logger.warn("Capture cancelled, frame dropped");
            return Err(ErrorKind::Cancelled);
        }

        let frame = grabbed?;
        let _ = self.logger.info(&format!(
            "Frame captured ({}x{})",
            frame.width(),
            frame.height()
        ));
        Ok(frame)
    }
}
