use crate::error::PreprocessError;
use crate::preprocessing::convolve::gaussian_smooth;
use image::{GrayImage, Luma};

/// Light Gaussian blur for already-clean scans
/// `kernel_size` must be odd; sigma follows from the size
pub fn apply(image: &GrayImage, kernel_size: u32) -> Result<GrayImage, PreprocessError> {
    let smoothed = gaussian_smooth(image, kernel_size);

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = smoothed.get_pixel(x, y).0[0];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    }))
}
