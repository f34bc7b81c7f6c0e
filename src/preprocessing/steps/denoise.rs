use crate::config::PipelineConfig;
use crate::error::PreprocessError;
use crate::preprocessing::convolve::clamp_index;
use image::{GrayImage, Luma};
use imageproc::filter::median_filter;

/// Parameters for the non-local-means denoiser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength h; larger values blend less similar patches
    pub strength: f32,
    /// Side of the compared patch (odd)
    pub template_window: u32,
    /// Side of the searched area (odd)
    pub search_window: u32,
    /// Radius of the impulse-removing median pre-filter, 0 to skip it
    pub median_radius: u32,
}

impl From<&PipelineConfig> for NlMeansParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            strength: config.denoise_strength,
            template_window: config.denoise_template_window,
            search_window: config.denoise_search_window,
            median_radius: config.denoise_median_radius,
        }
    }
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Remove noise with a median pre-filter followed by non-local means.
///
/// Isolated impulses make every patch look unique, which starves the patch
/// search of similar neighbours; the median pass clears them first. Non-local
/// means then averages pixels whose surroundings look alike, which keeps
/// edges that a plain blur would smear.
pub fn apply(image: &GrayImage, params: &NlMeansParams) -> Result<GrayImage, PreprocessError> {
    let filtered;
    let source = if params.median_radius > 0 {
        filtered = median_filter(image, params.median_radius, params.median_radius);
        &filtered
    } else {
        image
    };

    Ok(non_local_means(source, params))
}

fn non_local_means(image: &GrayImage, params: &NlMeansParams) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();
    let sample = |x: isize, y: isize| src[clamp_index(y, h) * w + clamp_index(x, w)] as f32;

    let template_radius = (params.template_window / 2) as isize;
    let search_radius = (params.search_window / 2) as isize;
    let patch_area = (params.template_window * params.template_window) as f32;
    let h_sq = params.strength * params.strength;

    // Squared differences are needed one template radius beyond every edge
    let pad = template_radius as usize;
    let (region_w, region_h) = (w + 2 * pad, h + 2 * pad);
    let stride = region_w + 1;
    let mut integral = vec![0.0f64; stride * (region_h + 1)];

    let mut weighted = vec![0.0f32; w * h];
    let mut weights = vec![0.0f32; w * h];

    for oy in -search_radius..=search_radius {
        for ox in -search_radius..=search_radius {
            // Summed-area table of (I(p) - I(p + offset))^2
            for ry in 0..region_h {
                let y = ry as isize - template_radius;
                let mut row_sum = 0.0f64;
                for rx in 0..region_w {
                    let x = rx as isize - template_radius;
                    let d = sample(x, y) - sample(x + ox, y + oy);
                    row_sum += (d * d) as f64;
                    integral[(ry + 1) * stride + rx + 1] = integral[ry * stride + rx + 1] + row_sum;
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let (x0, y0) = (x, y);
                    let (x1, y1) = (x + 2 * pad + 1, y + 2 * pad + 1);
                    let ssd = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                        - integral[y1 * stride + x0]
                        + integral[y0 * stride + x0];
                    let distance = ssd.max(0.0) as f32 / patch_area;
                    let weight = (-distance / h_sq).exp();

                    let i = y * w + x;
                    weighted[i] += weight * sample(x as isize + ox, y as isize + oy);
                    weights[i] += weight;
                }
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        // The zero offset always contributes weight 1
        let value = weighted[i] / weights[i];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}
