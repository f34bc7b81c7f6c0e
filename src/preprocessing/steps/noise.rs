use image::GrayImage;
use imageproc::filter::laplacian_filter;
use serde::Serialize;

/// Outcome of noise estimation for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoiseVerdict {
    pub noisy: bool,
    /// Laplacian variance of the image
    pub score: f64,
    /// Threshold the score was compared against
    pub threshold: f64,
}

/// Classify an image as noisy when its Laplacian variance falls below `threshold`.
///
/// The Laplacian variance measures edge detail, not noise. Soft, faded or
/// blurred scans score low and take the restoration branch. Uncorrelated
/// high-amplitude noise (salt-and-pepper included) adds high-frequency energy
/// and scores as clean.
pub fn estimate(image: &GrayImage, threshold: f64) -> NoiseVerdict {
    let score = laplacian_variance(image);
    NoiseVerdict {
        noisy: score < threshold,
        score,
        threshold,
    }
}

/// Population variance of the 4-neighbour Laplacian response over all pixels
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    let response = laplacian_filter(image);
    let count = response.as_raw().len();
    if count == 0 {
        return 0.0;
    }

    let (sum, sum_sq) = response
        .as_raw()
        .iter()
        .fold((0.0f64, 0.0f64), |(s, sq), &v| {
            let v = v as f64;
            (s + v, sq + v * v)
        });

    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}
