//! Gaussian smoothing shared by the blur and threshold steps
//!
//! Both passes of the separable convolution replicate edge pixels, so the
//! output always matches the input dimensions.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;

/// Sigma used for a Gaussian kernel of the given size when none is specified
pub fn default_sigma(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel of odd `size`
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = default_sigma(size);
    let radius = (size / 2) as i32;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Single-channel float image holding Gaussian-weighted means
pub type MeanImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Gaussian-weighted mean of every pixel's `size x size` neighbourhood.
///
/// Runs in `f32` so callers decide how to round.
pub fn gaussian_smooth(image: &GrayImage, size: u32) -> MeanImage {
    let levels: MeanImage = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[0] as f32])
    });
    separable_filter_equal(&levels, &gaussian_kernel(size))
}

/// Clamp a signed index into `0..len` (replicate-edge border)
pub fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
