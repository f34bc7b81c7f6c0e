use crate::error::PreprocessError;
use image::GrayImage;
use imageproc::filter::filter3x3;

/// Center weight 5, axis neighbours -1 each, corners 0
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Apply Laplacian-based sharpening
/// Edge pixels are replicated past the border; output is clamped to 0-255
pub fn apply(image: &GrayImage) -> Result<GrayImage, PreprocessError> {
    let sharpened: GrayImage = filter3x3(image, &SHARPEN_KERNEL);
    Ok(sharpened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_sharpen_enhances_edges() {
        // Left half dark, right half light
        let img = GrayImage::from_fn(20, 10, |x, _| {
            if x < 10 {
                Luma([50])
            } else {
                Luma([200])
            }
        });

        let result = apply(&img).unwrap();

        let edge_left = result.get_pixel(9, 5).0[0];
        let edge_right = result.get_pixel(10, 5).0[0];

        let original_diff = 200i32 - 50;
        let result_diff = (edge_right as i32 - edge_left as i32).abs();

        assert!(
            result_diff >= original_diff,
            "Edge should be enhanced: {} >= {}",
            result_diff,
            original_diff
        );
    }

    #[test]
    fn test_sharpen_keeps_flat_regions_and_borders() {
        let img = GrayImage::from_pixel(12, 8, Luma([90]));
        let result = apply(&img).unwrap();
        assert_eq!(result.dimensions(), (12, 8));
        // Replicated borders leave a flat image untouched, corners included
        assert!(result.pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn test_sharpen_isolated_dot() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([100]));
        img.put_pixel(2, 2, Luma([120]));
        let result = apply(&img).unwrap();
        // 5 * 120 - 4 * 100
        assert_eq!(result.get_pixel(2, 2).0[0], 200);
        // 5 * 100 - 120 - 3 * 100
        assert_eq!(result.get_pixel(2, 1).0[0], 80);
        assert_eq!(result.get_pixel(1, 1).0[0], 100);
    }
}
