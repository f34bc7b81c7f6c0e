use crate::error::PreprocessError;
use image::{GrayImage, Luma};

/// Equalize the intensity histogram
/// Remaps each level through the normalized cumulative distribution so the
/// output histogram is approximately flat
pub fn apply(image: &GrayImage) -> Result<GrayImage, PreprocessError> {
    let histogram = histogram(image);
    let total = image.as_raw().len() as u64;

    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (level, count) in histogram.iter().enumerate() {
        running += count;
        cdf[level] = running;
    }

    // Count of the darkest level present
    let cdf_min = histogram
        .iter()
        .zip(cdf.iter())
        .find(|(count, _)| **count > 0)
        .map(|(_, c)| *c)
        .unwrap_or(0);

    // Single-valued (or empty) image: nothing to spread
    if total <= cdf_min {
        return Ok(image.clone());
    }

    let range = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (level, entry) in lut.iter_mut().enumerate() {
        let scaled = cdf[level].saturating_sub(cdf_min) as f64 * 255.0 / range;
        *entry = scaled.round().clamp(0.0, 255.0) as u8;
    }

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([lut[image.get_pixel(x, y).0[0] as usize]])
    }))
}

fn histogram(img: &GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for pixel in img.pixels() {
        bins[pixel.0[0] as usize] += 1;
    }
    bins
}
