use crate::error::ErrorKind;
use crate::image_source::raw_image::RawImage;

/// An exclusive video capture device.
///
/// `open` claims the device and `close` gives it back. Callers should go
/// through `CameraLease` rather than pairing these by hand.
pub trait DeviceCamera: Send + Sync {
    /// Fails with `DeviceUnavailable`, `PermissionDenied` or `DeviceBusy`.
    fn open(&self) -> Result<(), ErrorKind>;

    /// Current frame of an opened device.
    fn grab_frame(&self) -> Result<RawImage, ErrorKind>;

    fn close(&self);
}
