pub mod tensor;

use crate::image_source::raw_image::RawImage;
use tensor::InputTensor;

/// Geometry of center-crop-after-scale: the shorter side is scaled to exactly
/// `side`, and the longer side is cropped equally on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropWindow {
    pub scale: f64,
    /// Pixels trimmed from the left of the scaled image.
    pub offset_x: f64,
    /// Pixels trimmed from the top of the scaled image.
    pub offset_y: f64,
}

impl CropWindow {
    pub fn compute(width: u32, height: u32, side: u32) -> Self {
        let shorter = width.min(height);
        let scale = side as f64 / shorter as f64;
        // The limiting dimension lands on `side` exactly, not on a product
        // that may be off by an ulp.
        let scaled = |dimension: u32| {
            if dimension == shorter {
                side as f64
            } else {
                dimension as f64 * scale
            }
        };
        Self {
            scale,
            offset_x: (scaled(width) - side as f64) / 2.0,
            offset_y: (scaled(height) - side as f64) / 2.0,
        }
    }

    /// The same window in source pixels: `(x, y, size)` of the centered
    /// square that ends up filling the tensor. `offset / scale` reduces to
    /// `(dimension - shorter) / 2`, which is exact in `f64` and lands on a
    /// half pixel when the difference is odd.
    pub fn source_square(width: u32, height: u32) -> (f64, f64, u32) {
        let size = width.min(height);
        (
            (width - size) as f64 / 2.0,
            (height - size) as f64 / 2.0,
            size,
        )
    }
}

/// Converts any frame into the fixed input tensor the classifier was trained
/// on. Pure and deterministic: the same image and side always give the same
/// bits.
pub fn normalize(image: &RawImage, side: u32) -> InputTensor {
    let resampled = center_crop_resize(image, side);
    let data = resampled.iter().map(|&v| v as f32 / 255.0).collect();
    InputTensor::new(side, data)
}

/// First source index and normalized weights for one output sample.
type Taps = (usize, Vec<f32>);

/// Triangle filter taps along one axis for a window starting at the
/// fractional source coordinate `origin`. Pixel `j` covers `[j, j + 1)`.
/// When shrinking, the support widens with the ratio so every source pixel
/// in the window contributes.
fn axis_taps(origin: f64, window: u32, len: u32, side: u32) -> Vec<Taps> {
    let ratio = window as f64 / side as f64;
    let support = ratio.max(1.0);

    (0..side)
        .map(|i| {
            let center = origin + (i as f64 + 0.5) * ratio;
            let first = (center - support).floor().max(0.0) as usize;
            let last = ((center + support).ceil() as usize).min(len as usize);

            let raw: Vec<f64> = (first..last)
                .map(|j| (1.0 - ((j as f64 + 0.5) - center).abs() / support).max(0.0))
                .collect();
            let sum: f64 = raw.iter().sum();
            let weights = raw.iter().map(|w| (w / sum) as f32).collect();
            (first, weights)
        })
        .collect()
}

/// Center-crop-after-scale as one separable triangle resample, so a window
/// origin on a half pixel is honored instead of snapped. Output is
/// `side * side * 3` bytes, row-major RGB.
fn center_crop_resize(image: &RawImage, side: u32) -> Vec<u8> {
    let (width, height) = (image.width(), image.height());
    let (x, y, size) = CropWindow::source_square(width, height);
    let rgb = image.to_rgb_image();
    let pixels = rgb.as_raw();
    let stride = width as usize * 3;
    let side_len = side as usize;

    let columns = axis_taps(x, size, width, side);
    let rows = axis_taps(y, size, height, side);

    let row_lo = rows.first().map_or(0, |(first, _)| *first);
    let row_hi = rows
        .iter()
        .map(|(first, weights)| first + weights.len())
        .max()
        .unwrap_or(row_lo);

    let mut horizontal = vec![0f32; (row_hi - row_lo) * side_len * 3];
    for row in row_lo..row_hi {
        let source = &pixels[row * stride..(row + 1) * stride];
        let target = &mut horizontal[(row - row_lo) * side_len * 3..][..side_len * 3];
        for (out, (first, weights)) in target.chunks_exact_mut(3).zip(&columns) {
            for (tap, weight) in weights.iter().enumerate() {
                let at = (first + tap) * 3;
                for channel in 0..3 {
                    out[channel] += weight * source[at + channel] as f32;
                }
            }
        }
    }

    let mut resampled = Vec::with_capacity(side_len * side_len * 3);
    for (first, weights) in &rows {
        for column in 0..side_len {
            let mut acc = [0f32; 3];
            for (tap, weight) in weights.iter().enumerate() {
                let at = ((first + tap - row_lo) * side_len + column) * 3;
                for channel in 0..3 {
                    acc[channel] += weight * horizontal[at + channel];
                }
            }
            resampled.extend(acc.iter().map(|v| v.round().clamp(0.0, 255.0) as u8));
        }
    }
    resampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_source::raw_image::{Encoding, PixelFormat};

    fn gradient(width: u32, height: u32) -> RawImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width.max(1)) as u8);
                pixels.push((y * 255 / height.max(1)) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        RawImage::from_pixels(width, height, PixelFormat::Rgb8, Encoding::Raw, pixels).unwrap()
    }

    /// Left half red, right half blue.
    fn split(width: u32, height: u32) -> RawImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..height {
            for x in 0..width {
                if x < width / 2 {
                    pixels.extend_from_slice(&[255, 0, 0]);
                } else {
                    pixels.extend_from_slice(&[0, 0, 255]);
                }
            }
        }
        RawImage::from_pixels(width, height, PixelFormat::Rgb8, Encoding::Raw, pixels).unwrap()
    }

    #[test]
    fn test_landscape_crops_left_and_right() {
        let window = CropWindow::compute(400, 200, 224);
        assert_eq!(window.scale, 224.0 / 200.0);
        assert!(window.offset_x > 0.0);
        assert_eq!(window.offset_y, 0.0);
        assert!((window.offset_x - 112.0).abs() < 1e-9);
        assert_eq!(CropWindow::source_square(400, 200), (100.0, 0.0, 200));
    }

    #[test]
    fn test_portrait_crops_top_and_bottom() {
        let window = CropWindow::compute(200, 400, 224);
        assert_eq!(window.offset_x, 0.0);
        assert!(window.offset_y > 0.0);
        assert_eq!(CropWindow::source_square(200, 400), (0.0, 100.0, 200));
    }

    #[test]
    fn test_square_has_no_offset() {
        let window = CropWindow::compute(300, 300, 224);
        assert_eq!(window.offset_x, 0.0);
        assert_eq!(window.offset_y, 0.0);
        assert_eq!(CropWindow::source_square(300, 300), (0.0, 0.0, 300));
    }

    #[test]
    fn test_odd_difference_keeps_half_pixel_origin() {
        let window = CropWindow::compute(301, 200, 224);
        assert!(((window.offset_x / window.scale) - 50.5).abs() < 1e-9);
        assert_eq!(CropWindow::source_square(301, 200), (50.5, 0.0, 200));
    }

    #[test]
    fn test_odd_difference_crop_stays_centered() {
        // Red is the distance from the middle column, so the source is
        // mirror-symmetric and a centered crop must be too.
        let (width, height) = (301u32, 200u32);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x as i32 - 150).unsigned_abs() as u8, 0, 0]);
            }
        }
        let image =
            RawImage::from_pixels(width, height, PixelFormat::Rgb8, Encoding::Raw, pixels).unwrap();

        let tensor = normalize(&image, 200);

        for x in 0..200 {
            assert_eq!(tensor.rgb_at(x, 10), tensor.rgb_at(199 - x, 10), "column {}", x);
        }
        // Blends the two source columns on either side of the half pixel.
        assert_eq!(tensor.rgb_at(0, 0)[0], 100.0 / 255.0);
    }

    #[test]
    fn test_shape_and_range() {
        for (w, h) in [(400, 200), (200, 400), (37, 91), (224, 224), (1, 1)] {
            let tensor = normalize(&gradient(w, h), 224);
            assert_eq!(tensor.len(), 224 * 224 * 3);
            assert_eq!(tensor.shape(), [1, 224, 224, 3]);
            assert!(tensor
                .as_slice()
                .iter()
                .all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_deterministic() {
        let image = gradient(640, 480);
        let first = normalize(&image, 224);
        let second = normalize(&image, 224);
        let first_bits: Vec<u32> = first.as_slice().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_solid_gray_is_uniform() {
        let image = RawImage::solid(224, 224, [128, 128, 128]).unwrap();
        let tensor = normalize(&image, 224);
        let expected = 128.0 / 255.0;
        assert!(tensor.as_slice().iter().all(|&v| v == expected));
    }

    #[test]
    fn test_solid_color_survives_resampling() {
        let image = RawImage::solid(500, 300, [255, 0, 51]).unwrap();
        let tensor = normalize(&image, 64);
        for (x, y) in [(0, 0), (63, 63), (32, 10)] {
            let [r, g, b] = tensor.rgb_at(x, y);
            assert_eq!(r, 1.0);
            assert_eq!(g, 0.0);
            assert!((b - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_channel_order_is_rgb() {
        let image = RawImage::solid(10, 10, [255, 0, 0]).unwrap();
        let tensor = normalize(&image, 10);
        assert_eq!(&tensor.as_slice()[..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_alpha_dropped() {
        let pixels = [10u8, 20, 30, 0].repeat(8 * 8);
        let image =
            RawImage::from_pixels(8, 8, PixelFormat::Rgba8, Encoding::Png, pixels).unwrap();
        let tensor = normalize(&image, 8);
        assert_eq!(tensor.len(), 8 * 8 * 3);
        assert_eq!(tensor.rgb_at(0, 0), [10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0]);
    }

    #[test]
    fn test_center_crop_keeps_middle_not_edges() {
        // 300x100 red|blue split; the center crop spans x in [100, 200), so
        // its left third is red from the original and its right is blue.
        let image = split(300, 100);
        let tensor = normalize(&image, 100);
        assert_eq!(tensor.rgb_at(0, 50), [1.0, 0.0, 0.0]);
        assert_eq!(tensor.rgb_at(99, 50), [0.0, 0.0, 1.0]);
    }
}
