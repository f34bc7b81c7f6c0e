use anyhow::{bail, Context};
use clap::Parser;
use image::DynamicImage;
use scanprep::{
    BranchSelection, ErrorResponse, Pipeline, PipelineConfig, PreprocessError,
    PreprocessingResult,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "scanprep")]
#[command(about = "Adaptive scan preprocessing: denoise, deskew and binarize pages for OCR")]
#[command(version)]
pub struct Args {
    /// Input images (PNG, JPEG, BMP, GIF)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file for a single input, or output directory for several
    #[arg(short, long, env = "SCANPREP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// JSON file with pipeline parameters; flags below override it
    #[arg(long, env = "SCANPREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Branch selection (auto, noisy, clean)
    #[arg(long, env = "SCANPREP_BRANCH")]
    pub branch: Option<String>,

    /// Laplacian variance below which a page counts as noisy
    #[arg(long, env = "SCANPREP_NOISE_THRESHOLD")]
    pub noise_threshold: Option<f64>,

    /// Non-local-means filter strength
    #[arg(long, env = "SCANPREP_DENOISE_STRENGTH")]
    pub denoise_strength: Option<f32>,

    /// Non-local-means patch size (odd)
    #[arg(long, env = "SCANPREP_TEMPLATE_WINDOW")]
    pub template_window: Option<u32>,

    /// Non-local-means search area size (odd)
    #[arg(long, env = "SCANPREP_SEARCH_WINDOW")]
    pub search_window: Option<u32>,

    /// Median pre-filter radius before non-local means (0 disables it)
    #[arg(long, env = "SCANPREP_MEDIAN_RADIUS")]
    pub median_radius: Option<u32>,

    /// Pixels darker than this count as ink when estimating skew
    #[arg(long, env = "SCANPREP_INK_THRESHOLD")]
    pub ink_threshold: Option<u8>,

    /// Adaptive threshold neighbourhood size (odd, at least 3)
    #[arg(long, env = "SCANPREP_BLOCK_SIZE")]
    pub block_size: Option<u32>,

    /// Constant subtracted from the local mean
    #[arg(long, env = "SCANPREP_ADAPTIVE_CONSTANT", allow_hyphen_values = true)]
    pub adaptive_constant: Option<f32>,

    /// Gaussian kernel size for the clean branch (odd)
    #[arg(long, env = "SCANPREP_BLUR_KERNEL")]
    pub blur_kernel: Option<u32>,

    /// Print a JSON report of every run to stdout
    #[arg(long)]
    pub report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Load the config file if given, then apply flag overrides
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(name) = &self.branch {
            config.branch = match BranchSelection::from_name(name) {
                Some(branch) => branch,
                None => bail!("Unknown branch '{}': expected auto, noisy or clean", name),
            };
        }
        if let Some(v) = self.noise_threshold {
            config.noise_variance_threshold = v;
        }
        if let Some(v) = self.denoise_strength {
            config.denoise_strength = v;
        }
        if let Some(v) = self.template_window {
            config.denoise_template_window = v;
        }
        if let Some(v) = self.search_window {
            config.denoise_search_window = v;
        }
        if let Some(v) = self.median_radius {
            config.denoise_median_radius = v;
        }
        if let Some(v) = self.ink_threshold {
            config.deskew_ink_threshold = v;
        }
        if let Some(v) = self.block_size {
            config.adaptive_block_size = v;
        }
        if let Some(v) = self.adaptive_constant {
            config.adaptive_constant = v;
        }
        if let Some(v) = self.blur_kernel {
            config.clean_blur_kernel = v;
        }

        Ok(config)
    }

    /// Where the result for `input` is written, if anywhere
    fn output_path(&self, input: &Path) -> Option<PathBuf> {
        let output = self.output.as_ref()?;
        if self.inputs.len() == 1 {
            return Some(output.clone());
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        Some(output.join(format!("{}.png", stem)))
    }
}

/// One entry of the `--report` output
#[derive(Serialize)]
struct RunReport<'a> {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a PreprocessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorResponse>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.pipeline_config()?;
    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    tracing::info!(
        "Starting scanprep v{} with {} input(s), branch {}",
        env!("CARGO_PKG_VERSION"),
        args.inputs.len(),
        pipeline.config().branch.as_str()
    );

    if args.inputs.len() > 1 {
        if let Some(dir) = &args.output {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
    }

    // Unreadable inputs fail on their own; the rest still get processed
    let mut slots = Vec::with_capacity(args.inputs.len());
    let mut images = Vec::new();
    for path in &args.inputs {
        match load_image(path) {
            Ok(image) => {
                images.push(image);
                slots.push(None);
            }
            Err(e) => slots.push(Some(Err(e))),
        }
    }

    let mut outcomes = if images.len() == 1 {
        vec![pipeline.process(&images[0])]
    } else {
        pipeline.process_batch(&images)
    }
    .into_iter();

    let results: Vec<Result<PreprocessingResult, PreprocessError>> = slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| outcomes.next()))
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = 0usize;

    for (input, result) in args.inputs.iter().zip(results.iter()) {
        let output = args.output_path(input);
        match result {
            Ok(processed) => {
                if let Some(path) = &output {
                    processed
                        .image
                        .save(path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Wrote {}", path.display());
                }
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Failed to preprocess {}: {}", input.display(), e);
            }
        }

        reports.push(RunReport {
            input: input.display().to_string(),
            output: output
                .filter(|_| result.is_ok())
                .map(|p| p.display().to_string()),
            result: result.as_ref().ok(),
            error: result.as_ref().err().map(ErrorResponse::from),
        });
    }

    if args.report {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize report")?
        );
    }

    if failures > 0 {
        bail!("{} of {} input(s) failed", failures, args.inputs.len());
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    image::open(path).map_err(|e| {
        PreprocessError::InvalidImage(format!("failed to open {}: {}", path.display(), e))
    })
}
