use crate::error::ErrorKind;
use image::{DynamicImage, Rgb, RgbImage};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// How the frame reached us. Pixels are always stored decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Raw,
    Jpeg,
    Png,
}

/// A single decoded frame. Fields are private so a `RawImage` can only exist
/// with a pixel buffer that matches its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    encoding: Encoding,
    pixels: Vec<u8>,
}

impl RawImage {
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        encoding: Encoding,
        pixels: Vec<u8>,
    ) -> Result<Self, ErrorKind> {
        if width == 0 || height == 0 {
            return Err(ErrorKind::unsupported_format(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        let expected = width as usize * height as usize * format.channels();
        if pixels.len() != expected {
            return Err(ErrorKind::unsupported_format(format!(
                "pixel buffer is {} bytes, {}x{} {:?} needs {}",
                pixels.len(),
                width,
                height,
                format,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            encoding,
            pixels,
        })
    }

    /// Keeps the alpha channel only when the decoded image had one.
    pub fn from_dynamic(image: DynamicImage, encoding: Encoding) -> Self {
        let (width, height) = (image.width(), image.height());
        if image.color().has_alpha() {
            Self {
                width,
                height,
                format: PixelFormat::Rgba8,
                encoding,
                pixels: image.to_rgba8().into_raw(),
            }
        } else {
            Self {
                width,
                height,
                format: PixelFormat::Rgb8,
                encoding,
                pixels: image.to_rgb8().into_raw(),
            }
        }
    }

    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, ErrorKind> {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::from_pixels(width, height, PixelFormat::Rgb8, Encoding::Raw, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let channels = self.format.channels();
        let index = (y as usize * self.width as usize + x as usize) * channels;
        [
            self.pixels[index],
            self.pixels[index + 1],
            self.pixels[index + 2],
        ]
    }

    /// RGB view of the frame with any alpha channel dropped.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| Rgb(self.pixel(x, y)))
    }
}
