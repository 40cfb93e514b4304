pub mod device_camera;
pub mod file;
pub mod raw_image;

use crate::error::ErrorKind;
use raw_image::RawImage;

/// Anything that can hand over exactly one frame for analysis.
pub trait ImageSource: Send {
    fn acquire(&self) -> Result<RawImage, ErrorKind>;
}
