use crate::config::{BranchSelection, PipelineConfig};
use crate::error::{PreprocessError, Stage};
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::steps;
use super::steps::deskew::SkewAngle;
use super::steps::denoise::NlMeansParams;
use super::steps::noise::NoiseVerdict;

/// Processing branch chosen for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// Denoise, sharpen, equalize, deskew
    Noisy,
    /// Light Gaussian blur only
    Clean,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noisy => "noisy",
            Self::Clean => "clean",
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Binary image, 0 for ink and 255 for paper (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    pub width: u32,
    pub height: u32,
    pub branch: Branch,
    pub noise: NoiseVerdict,
    /// Only set when the deskew step ran and found ink
    pub skew: Option<SkewAngle>,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline: grayscale, noise estimate, one of two branches,
/// then adaptive threshold
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, rejecting out-of-domain parameters up front
    pub fn new(config: PipelineConfig) -> Result<Self, PreprocessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a single image end to end
    pub fn process(&self, image: &DynamicImage) -> Result<PreprocessingResult, PreprocessError> {
        self.run(image, None)
    }

    /// Like [`Pipeline::process`], checking `cancel` at every stage boundary
    pub fn process_with_cancel(
        &self,
        image: &DynamicImage,
        cancel: &AtomicBool,
    ) -> Result<PreprocessingResult, PreprocessError> {
        self.run(image, Some(cancel))
    }

    /// Process independent images in parallel; results keep input order
    pub fn process_batch(
        &self,
        images: &[DynamicImage],
    ) -> Vec<Result<PreprocessingResult, PreprocessError>> {
        images.par_iter().map(|image| self.process(image)).collect()
    }

    fn run(
        &self,
        image: &DynamicImage,
        cancel: Option<&AtomicBool>,
    ) -> Result<PreprocessingResult, PreprocessError> {
        let start = Instant::now();
        let mut run = StepRun {
            cancel,
            timings: Vec::new(),
            last: None,
        };
        let config = &self.config;

        let step_start = Instant::now();
        let gray = steps::grayscale::apply(image)?;
        run.record(Stage::Grayscale, step_start);

        run.check_cancelled()?;
        let step_start = Instant::now();
        let noise = steps::noise::estimate(&gray, config.noise_variance_threshold);
        run.record(Stage::NoiseEstimate, step_start);

        let branch = match config.branch {
            BranchSelection::Auto if noise.noisy => Branch::Noisy,
            BranchSelection::Auto => Branch::Clean,
            BranchSelection::Noisy => Branch::Noisy,
            BranchSelection::Clean => Branch::Clean,
        };

        tracing::debug!(
            "Laplacian variance {:.2} (threshold {:.2}), taking {} branch",
            noise.score,
            noise.threshold,
            branch.as_str()
        );

        let mut skew = None;
        let mut img = gray;

        match branch {
            Branch::Noisy => {
                let params = NlMeansParams::from(config);
                img = run.step(Stage::Denoise, &img, |g| steps::denoise::apply(g, &params))?;
                img = run.step(Stage::Sharpen, &img, steps::sharpen::apply)?;
                img = run.step(Stage::Equalize, &img, steps::equalize::apply)?;
                img = run.step(Stage::Deskew, &img, |g| {
                    let deskewed = steps::deskew::apply(g, config.deskew_ink_threshold)?;
                    skew = deskewed.angle;
                    Ok(deskewed.image)
                })?;
            }
            Branch::Clean => {
                img = run.step(Stage::Blur, &img, |g| {
                    steps::blur::apply(g, config.clean_blur_kernel)
                })?;
            }
        }

        img = run.step(Stage::Threshold, &img, |g| {
            steps::threshold::apply(g, config.adaptive_block_size, config.adaptive_constant)
        })?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Preprocessed {}x{} image via {} branch in {}ms",
            img.width(),
            img.height(),
            branch.as_str(),
            total_time_ms
        );

        Ok(PreprocessingResult {
            width: img.width(),
            height: img.height(),
            image: img,
            branch,
            noise,
            skew,
            total_time_ms,
            steps: run.timings,
        })
    }
}

/// Per-run bookkeeping for timings and cancellation
struct StepRun<'a> {
    cancel: Option<&'a AtomicBool>,
    timings: Vec<StepTiming>,
    last: Option<Stage>,
}

impl StepRun<'_> {
    fn step<F>(
        &mut self,
        stage: Stage,
        img: &GrayImage,
        step_fn: F,
    ) -> Result<GrayImage, PreprocessError>
    where
        F: FnOnce(&GrayImage) -> Result<GrayImage, PreprocessError>,
    {
        self.check_cancelled()?;
        let step_start = Instant::now();
        let result = step_fn(img)?;

        if result.dimensions() != img.dimensions() {
            return Err(PreprocessError::stage_failure(
                stage,
                format!(
                    "output is {}x{} but input was {}x{}",
                    result.width(),
                    result.height(),
                    img.width(),
                    img.height()
                ),
            ));
        }

        self.record(stage, step_start);
        Ok(result)
    }

    fn record(&mut self, stage: Stage, step_start: Instant) {
        let time_ms = step_start.elapsed().as_millis() as u64;
        tracing::debug!("Step {} finished in {}ms", stage, time_ms);
        self.timings.push(StepTiming {
            name: stage.as_str().to_string(),
            time_ms,
        });
        self.last = Some(stage);
    }

    /// Grayscale conversion always completes, so there is a stage to report
    fn check_cancelled(&self) -> Result<(), PreprocessError> {
        match (self.cancel, self.last) {
            (Some(flag), Some(after)) if flag.load(Ordering::Relaxed) => {
                tracing::debug!("Cancellation requested after {}", after);
                Err(PreprocessError::Cancelled { after })
            }
            _ => Ok(()),
        }
    }
}

/// Run the pipeline once with `config` and return only the binary image
pub fn process(
    image: &DynamicImage,
    config: &PipelineConfig,
) -> Result<GrayImage, PreprocessError> {
    Ok(Pipeline::new(config.clone())?.process(image)?.image)
}
