use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage};

/// Validate the source image and convert it to 8-bit grayscale.
///
/// Only 8-bit layouts are accepted; alpha is dropped.
pub fn apply(image: &DynamicImage) -> Result<GrayImage, PreprocessError> {
    validate(image)?;
    Ok(image.to_luma8())
}

/// Reject empty images and pixel layouts the pipeline does not handle
pub fn validate(image: &DynamicImage) -> Result<(), PreprocessError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::InvalidImage(format!(
            "image has zero size ({}x{})",
            image.width(),
            image.height()
        )));
    }

    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => Ok(()),
        other => Err(PreprocessError::InvalidImage(format!(
            "unsupported pixel layout {:?}; expected 8-bit gray or color",
            other.color()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn test_grayscale_converts_color() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(0, 0, Rgb([255, 0, 0])); // Red
        img.put_pixel(1, 0, Rgb([0, 255, 0])); // Green
        img.put_pixel(2, 0, Rgb([0, 0, 255])); // Blue

        let gray = apply(&DynamicImage::ImageRgb8(img)).unwrap();

        assert!(gray.get_pixel(0, 0).0[0] > 0);
        assert!(gray.get_pixel(1, 0).0[0] > 0);
        assert!(gray.get_pixel(2, 0).0[0] > 0);
        assert_eq!(gray.get_pixel(5, 5).0[0], 0);
    }

    #[test]
    fn test_grayscale_preserves_dimensions() {
        let img = RgbImage::new(100, 50);
        let result = apply(&DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(result.dimensions(), (100, 50));
    }

    #[test]
    fn test_rejects_empty_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert!(matches!(
            apply(&img),
            Err(PreprocessError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_rejects_sixteen_bit_input() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(4, 4);
        let err = apply(&DynamicImage::ImageLuma16(img)).unwrap_err();
        assert_eq!(err.code(), "INVALID_IMAGE");
    }
}
