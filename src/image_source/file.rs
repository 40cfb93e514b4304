use crate::error::ErrorKind;
use crate::image_source::raw_image::{Encoding, RawImage};
use crate::image_source::ImageSource;
use image::{ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// Widest or tallest image the decoder will accept.
pub const MAX_DECODED_SIDE: u32 = 16_384;
/// Decoder allocation cap, roughly a 100 megapixel RGBA frame.
pub const MAX_DECODE_ALLOC: u64 = 400 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODED_SIDE);
    limits.max_image_height = Some(MAX_DECODED_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Checks an uploaded or dropped file and decodes it.
///
/// Size is checked first, then the declared MIME type, then the bytes
/// themselves. Only JPEG and PNG are accepted.
pub fn decode_upload(
    bytes: &[u8],
    mime: Option<&str>,
    max_bytes: usize,
) -> Result<RawImage, ErrorKind> {
    if bytes.len() > max_bytes {
        return Err(ErrorKind::FileTooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    if let Some(mime) = mime {
        if !mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(ErrorKind::unsupported_format(format!(
                "declared type {} is not an image",
                mime
            )));
        }
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ErrorKind::unsupported_format(e.to_string()))?;

    let encoding = match reader.format() {
        Some(ImageFormat::Jpeg) => Encoding::Jpeg,
        Some(ImageFormat::Png) => Encoding::Png,
        Some(other) => {
            return Err(ErrorKind::unsupported_format(format!(
                "{:?} images are not accepted",
                other
            )))
        }
        None => return Err(ErrorKind::unsupported_format("unrecognized image data")),
    };

    reader.limits(decode_limits());
    let image = reader
        .decode()
        .map_err(|e| ErrorKind::unsupported_format(e.to_string()))?;

    Ok(RawImage::from_dynamic(image, encoding))
}

/// The file variant: an already-fetched byte buffer waiting to be decoded.
pub struct UploadSource {
    bytes: Vec<u8>,
    mime: Option<String>,
    max_bytes: usize,
}

impl UploadSource {
    pub fn new(bytes: Vec<u8>, mime: Option<String>, max_bytes: usize) -> Self {
        Self {
            bytes,
            mime,
            max_bytes,
        }
    }
}

impl ImageSource for UploadSource {
    fn acquire(&self) -> Result<RawImage, ErrorKind> {
        decode_upload(&self.bytes, self.mime.as_deref(), self.max_bytes)
    }
}
