use crate::error::ErrorKind;
use crate::image_source::device_camera::interface::DeviceCamera;
use crate::image_source::raw_image::RawImage;
use crate::library::logger::interface::Logger;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum CameraBehavior {
    Frame(RawImage),
    FailOpen(ErrorKind),
    FailGrab(ErrorKind),
}

pub struct DeviceCameraFake {
    logger: Arc<dyn Logger + Send + Sync>,
    behavior: Mutex<CameraBehavior>,
    frame_delay: Duration,
    held: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl DeviceCameraFake {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>, behavior: CameraBehavior) -> Self {
        Self {
            logger: logger.with_namespace("camera").with_namespace("fake"),
            behavior: Mutex::new(behavior),
            frame_delay: Duration::ZERO,
            held: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Makes every grab take this long, like a sensor warming up.
    pub fn with_frame_delay(mut self, frame_delay: Duration) -> Self {
        self.frame_delay = frame_delay;
        self
    }

    pub fn set_behavior(&self, behavior: CameraBehavior) {
        match self.behavior.lock() {
            Ok(mut current) => *current = behavior,
            Err(poisoned) => *poisoned.into_inner() = behavior,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn behavior(&self) -> CameraBehavior {
        match self.behavior.lock() {
            Ok(behavior) => behavior.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DeviceCamera for DeviceCameraFake {
    fn open(&self) -> Result<(), ErrorKind> {
        let _ = self.logger.info("Opening camera...");

        if let CameraBehavior::FailOpen(kind) = self.behavior() {
            let _ = self.logger.warn(&format!("Camera open refused: {}", kind));
            return Err(kind);
        }

        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ErrorKind::DeviceBusy);
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        let _ = self.logger.info("Camera opened");
        Ok(())
    }

    fn grab_frame(&self) -> Result<RawImage, ErrorKind> {
        if !self.is_held() {
            return Err(ErrorKind::DeviceUnavailable);
        }

        if !self.frame_delay.is_zero() {
            std::thread::sleep(self.frame_delay);
        }

        match self.behavior() {
            CameraBehavior::Frame(frame) => Ok(frame),
            CameraBehavior::FailGrab(kind) | CameraBehavior::FailOpen(kind) => Err(kind),
        }
    }

    fn close(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            let _ = self.logger.info("Camera closed");
        }
    }
}
