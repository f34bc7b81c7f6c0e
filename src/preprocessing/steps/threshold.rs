use crate::error::PreprocessError;
use crate::preprocessing::convolve::gaussian_smooth;
use image::{GrayImage, Luma};

/// Ink in the binary output
pub const FOREGROUND: u8 = 0;
/// Paper in the binary output
pub const BACKGROUND: u8 = 255;

/// Gaussian adaptive thresholding
///
/// Each pixel is compared against the Gaussian-weighted mean of its
/// `block_size x block_size` neighbourhood minus `constant`. Pixels brighter
/// than that local threshold become background, the rest foreground. A local
/// threshold follows illumination gradients across a page where a single
/// global level cannot.
///
/// Inside a uniform region wider than the block the mean equals the pixel
/// value, so with a positive constant the whole region reads as background.
pub fn apply(
    image: &GrayImage,
    block_size: u32,
    constant: f32,
) -> Result<GrayImage, PreprocessError> {
    let means = gaussian_smooth(image, block_size);

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let local_threshold = means.get_pixel(x, y).0[0] - constant;
        let pixel = image.get_pixel(x, y).0[0] as f32;
        if pixel > local_threshold {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarizes_image() {
        let img = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));

        let result = apply(&img, 11, 2.0).unwrap();

        for pixel in result.pixels() {
            assert!(
                pixel.0[0] == FOREGROUND || pixel.0[0] == BACKGROUND,
                "Expected binary pixel, got {}",
                pixel.0[0]
            );
        }
    }

    #[test]
    fn test_threshold_handles_text_pattern() {
        // Dark text on light background
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20]));
        }

        let result = apply(&img, 11, 2.0).unwrap();

        assert_eq!(result.get_pixel(25, 10).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(25, 5).0[0], BACKGROUND);
    }

    #[test]
    fn test_threshold_tolerates_illumination_gradient() {
        // Page brightens from 60 to 250 left to right, with a dark stroke
        // that is brighter on the right than the paper is on the left
        let mut img = GrayImage::from_fn(120, 30, |x, _| Luma([(60 + x * 190 / 119) as u8]));
        for x in 0..120 {
            let paper = img.get_pixel(x, 15).0[0];
            img.put_pixel(x, 15, Luma([paper.saturating_sub(50)]));
        }

        let result = apply(&img, 11, 2.0).unwrap();

        for x in 0..120 {
            assert_eq!(result.get_pixel(x, 15).0[0], FOREGROUND, "stroke at x={}", x);
            assert_eq!(result.get_pixel(x, 3).0[0], BACKGROUND, "paper at x={}", x);
        }
    }

    #[test]
    fn test_threshold_is_deterministic() {
        let img = GrayImage::from_fn(64, 48, |x, y| {
            Luma([((x * 37 + y * 91 + x * y) % 256) as u8])
        });
        let first = apply(&img, 11, 2.0).unwrap();
        let second = apply(&img, 11, 2.0).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_uniform_region_reads_as_background() {
        let img = GrayImage::from_pixel(30, 30, Luma([10]));
        let result = apply(&img, 11, 2.0).unwrap();
        assert!(result.pixels().all(|p| p.0[0] == BACKGROUND));
    }
}
